#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt; // for oneshot
use url::Url;

use deploys_auth::{
    app::{build_router, AppState},
    auth::{google::IdentityProvider, tokens::TokenStores},
    config::AppConfig,
    error::UpstreamError,
    models::{now_timestamp, oauth2_client::OAuth2Client},
    repos::{memory::MemoryRepo, BrokerRepo},
    tasks::BackgroundTasks,
    telemetry::{MemorySink, Telemetry},
};

pub const GOOD_CODE: &str = "good-code";
pub const EMAIL: &str = "a@b.com";
pub const LANDING: &str = "https://www.deploys.app/";

/// Identity provider stand-in: `good-code` resolves to [`EMAIL`], `ya29.good` introspects to it.
pub struct FakeProvider;

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorize_url(&self, state: &str) -> Url {
        let mut url = Url::parse("https://accounts.google.com/o/oauth2/auth").unwrap();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", "google-client")
            .append_pair("state", state);
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<String, UpstreamError> {
        if code == GOOD_CODE {
            Ok(EMAIL.to_string())
        } else {
            Err(UpstreamError::Status(400))
        }
    }

    async fn introspect(&self, access_token: &str) -> Result<Option<String>, UpstreamError> {
        Ok((access_token == "ya29.good").then(|| EMAIL.to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepo>,
    pub sink: Arc<MemorySink>,
    pub tasks: BackgroundTasks,
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.server.public_url = "https://auth.example".into();
    cfg.server.landing_url = LANDING.into();
    cfg.google.client_id = "google-client".into();
    cfg
}

pub fn build_test_app() -> TestApp {
    let repo = MemoryRepo::new();
    let sink = MemorySink::new();
    let telemetry = Telemetry::new(sink.clone());
    let tasks = BackgroundTasks::new();
    let stores = TokenStores::primary_only(repo.clone(), telemetry.clone());
    let state = AppState::new(
        test_config(),
        repo.clone(),
        stores,
        Arc::new(FakeProvider),
        telemetry,
        tasks.clone(),
    );
    TestApp { router: build_router(state), repo, sink, tasks }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_with_cookie(&self, uri: &str, session_id: &str) -> Response<Body> {
        let req = Request::get(uri)
            .header(header::COOKIE, format!("s={session_id}"))
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let req = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    pub async fn register_client(&self, id: &str, secret: &str, redirect_uri: &str) {
        self.repo
            .save_client(OAuth2Client {
                id: id.into(),
                secret: secret.into(),
                redirect_uri: redirect_uri.into(),
                created_at: now_timestamp(),
            })
            .await
            .unwrap();
    }

    /// Runs `GET /?…` and returns the session cookie value and the state sent to the provider.
    pub async fn start_login(&self, query: &str) -> (String, String) {
        let res = self.get(&format!("/?{query}")).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        let session_id = session_cookie(&res).expect("session cookie");
        let state = query_param(&location(&res), "state").expect("state");
        (session_id, state)
    }
}

pub fn location(res: &Response<Body>) -> Url {
    let raw = res.headers().get(header::LOCATION).expect("Location header").to_str().unwrap();
    Url::parse(raw).expect("absolute Location")
}

pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
}

pub fn session_cookie(res: &Response<Body>) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|c| c.split(';').next()?.trim().strip_prefix("s=").map(str::to_string))
}

pub async fn body_text(res: Response<Body>) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(res: Response<Body>) -> serde_json::Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
