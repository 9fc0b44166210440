use axum::{
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use tower_cookies::Cookies;
use url::Url;

use crate::{
    app::AppState,
    auth::{
        clients::ClientRegistry,
        session::{self, is_valid_callback_url},
    },
    error::{BrokerError, SessionError},
    web::{found, required},
};

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub state: Option<String>,
    pub callback: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
}

/// `GET /`: starts a login. Registered clients pass `client_id` + `redirect_uri`;
/// first-party callers pass `callback`.
pub async fn authorize(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(q): Query<AuthorizeQuery>,
) -> Result<Response, BrokerError> {
    let callback_state = required(&q.state, "Missing state parameter")?;

    let created = if q.client_id.as_deref().is_some_and(|c| !c.is_empty()) {
        let client_id = required(&q.client_id, "Missing client_id parameter")?;
        let redirect_uri = required(&q.redirect_uri, "Missing redirect_uri parameter")?;
        if !is_valid_callback_url(redirect_uri) {
            return Err(BrokerError::BadRequest("Invalid redirect_uri parameter"));
        }
        let client = state.clients.lookup(client_id).await?;
        if !ClientRegistry::redirect_allowed(&client, redirect_uri) {
            return Err(BrokerError::BadRequest("Invalid redirect_uri parameter"));
        }
        state.sessions.create(callback_state, redirect_uri, Some(&client.id)).await?
    } else {
        let callback = required(&q.callback, "Missing callback parameter")?;
        state.sessions.create(callback_state, callback, None).await?
    };

    session::set_session_cookie(&cookies, &created.id, state.config.server.cookie_secure);
    let target = state.provider.authorize_url(&created.state);
    Ok(found(target.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// `GET /callback`: the identity provider returns here after login.
pub async fn callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(q): Query<CallbackQuery>,
) -> Result<Response, BrokerError> {
    let provider_state = required(&q.state, "Missing state parameter")?;
    let code = required(&q.code, "Missing code parameter")?;
    let session_id = session::session_cookie(&cookies).ok_or(BrokerError::BadRequest("Missing session cookie"))?;

    let session = match state.sessions.consume(&session_id, provider_state).await {
        Ok(s) => s,
        Err(SessionError::NotFound) => {
            tracing::info!("callback without a live session");
            return Ok(found(&state.config.server.landing_url));
        }
        Err(e) => return Err(e.into()),
    };

    let email = match state.provider.exchange_code(code).await {
        Ok(email) => email,
        Err(e) => {
            tracing::warn!(error = ?e, "code exchange failed");
            return Ok(found(&state.config.server.landing_url));
        }
    };

    // Registered clients redeem a one-time code at /token; direct callers get the token itself.
    let returned = match session.client_id.as_deref() {
        Some(client_id) => state.codes.create(client_id, &email).await?,
        None => state.tokens.issue(&email, &state.config.direct_client_id).await?,
    };

    let Ok(mut target) = Url::parse(&session.callback_url) else {
        tracing::error!(callback_url = %session.callback_url, "stored callback url does not parse");
        return Ok(found(&state.config.server.landing_url));
    };
    let kept: Vec<(String, String)> = target
        .query_pairs()
        .into_owned()
        .filter(|(k, _)| k != "state" && k != "code")
        .collect();
    target
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("state", &session.callback_state)
        .append_pair("code", &returned);
    tracing::info!(client_id = ?session.client_id, "login completed");
    Ok(found(target.as_str()))
}
