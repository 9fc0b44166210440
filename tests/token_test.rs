use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use deploys_auth::repos::BrokerRepo;

#[path = "common.rs"]
mod common;

/// Registers `c1`, runs a full login and returns the exchange code handed to the client.
async fn exchange_code(app: &common::TestApp) -> String {
    app.register_client("c1", "secret", "https://example.com/*").await;
    let (session_id, state) = app
        .start_login("client_id=c1&state=xyz&redirect_uri=https%3A%2F%2Fexample.com%2Fdone")
        .await;
    let res = app
        .get_with_cookie(&format!("/callback?state={state}&code={}", common::GOOD_CODE), &session_id)
        .await;
    common::query_param(&common::location(&res), "code").expect("code")
}

async fn info(app: &common::TestApp, authorization: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::get("/info")
        .header(header::AUTHORIZATION, authorization)
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    (res.status(), common::body_json(res).await)
}

#[tokio::test]
async fn code_is_redeemed_once_for_a_bearer_token() {
    let app = common::build_test_app();
    let code = exchange_code(&app).await;

    let res = app
        .post_form("/token", &[("client_id", "c1"), ("client_secret", "secret"), ("code", code.as_str())])
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = common::body_json(res).await;
    assert_eq!(body["token_type"], "Bearer");
    let token = body["refresh_token"].as_str().expect("refresh_token").to_string();
    assert!(token.starts_with("deploys-api."));

    let (status, body) = info(&app, &format!("Bearer {token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["result"]["email"], common::EMAIL);
    assert_eq!(body["result"]["clientId"], "c1");

    let res = app
        .post_form("/token", &[("client_id", "c1"), ("client_secret", "secret"), ("code", code.as_str())])
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::body_text(res).await, "Invalid code parameter");
    app.tasks.drain().await;
}

#[tokio::test]
async fn token_endpoint_rejects_bad_input() {
    let app = common::build_test_app();
    let code = exchange_code(&app).await;

    let cases: [(&[(&str, &str)], &str); 5] = [
        (&[("client_secret", "secret"), ("code", "x")], "Missing client_id parameter"),
        (&[("client_id", "c1"), ("code", "x")], "Missing client_secret parameter"),
        (&[("client_id", "c1"), ("client_secret", "secret")], "Missing code parameter"),
        (&[("client_id", "nope"), ("client_secret", "secret"), ("code", "x")], "Invalid client_id parameter"),
        (&[("client_id", "c1"), ("client_secret", "wrong"), ("code", "x")], "Invalid client_secret parameter"),
    ];
    for (fields, message) in cases {
        let res = app.post_form("/token", fields).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(common::body_text(res).await, message);
    }

    // the code survives the failed attempts
    let res = app
        .post_form("/token", &[("client_id", "c1"), ("client_secret", "secret"), ("code", code.as_str())])
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    app.tasks.drain().await;
}

#[tokio::test]
async fn inactive_accounts_are_refused() {
    let app = common::build_test_app();
    let code = exchange_code(&app).await;
    app.repo.set_account_active(common::EMAIL, false).await.unwrap();

    let res = app
        .post_form("/token", &[("client_id", "c1"), ("client_secret", "secret"), ("code", code.as_str())])
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.repo.token_count(), 0);
    app.tasks.drain().await;
}

#[tokio::test]
async fn info_rejects_unknown_tokens_without_writes() {
    let app = common::build_test_app();

    let (status, body) = info(&app, "Bearer deploys-api.bogus").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["message"], "auth: unauthorized");

    let (_, body) = info(&app, "Basic abc").await;
    assert_eq!(body["ok"], false);
    let (_, body) = info(&app, "Bearer gho_abc").await;
    assert_eq!(body["ok"], false);

    assert_eq!(app.repo.token_count(), 0);
    assert_eq!(app.repo.session_count(), 0);
    // the bogus broker token was looked up once; the others never reached a store
    assert_eq!(app.sink.latency_names(), vec!["token_find.primary"]);
}

#[tokio::test]
async fn google_access_tokens_are_introspected() {
    let app = common::build_test_app();
    let (status, body) = info(&app, "Bearer ya29.good").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["email"], common::EMAIL);
    assert!(body["result"].get("clientId").is_none());

    let (status, _) = info(&app, "Bearer ya29.expired").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

async fn issue_token(app: &common::TestApp) -> String {
    let code = exchange_code(app).await;
    let res = app
        .post_form("/token", &[("client_id", "c1"), ("client_secret", "secret"), ("code", code.as_str())])
        .await;
    let body = common::body_json(res).await;
    body["refresh_token"].as_str().expect("refresh_token").to_string()
}

#[tokio::test]
async fn revoke_redirects_and_invalidates() {
    let app = common::build_test_app();
    let token = issue_token(&app).await;

    let res = app
        .get(&format!("/revoke?token={token}&callback=https%3A%2F%2Fclient.example%2Fbye"))
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(common::location(&res).as_str(), "https://client.example/bye");
    assert_eq!(app.repo.token_count(), 0);

    let (status, _) = info(&app, &format!("Bearer {token}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // unknown tokens and missing params still land somewhere
    let res = app.get("/revoke?token=deploys-api.unknown").await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(common::location(&res).as_str(), common::LANDING);
    let res = app.get("/revoke").await;
    assert_eq!(common::location(&res).as_str(), common::LANDING);
    app.tasks.drain().await;
}

#[tokio::test]
async fn json_revoke() {
    let app = common::build_test_app();
    let token = issue_token(&app).await;

    let post = |body: String| {
        Request::post("/revoke")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    };

    let res = app.send(post(serde_json::json!({ "token": token }).to_string())).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = common::body_json(res).await;
    assert_eq!(body, serde_json::json!({ "ok": true, "result": {} }));
    assert_eq!(app.repo.token_count(), 0);

    let res = app.send(post("{}".to_string())).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.send(post("not json".to_string())).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(res).await;
    assert_eq!(body["error"]["message"], "invalid request body");
    app.tasks.drain().await;
}
