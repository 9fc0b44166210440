use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    app::AppState,
    error::{BrokerError, TokenError},
    security::bearer_token,
    web::{api_error, api_ok, found},
};

const UNAUTHORIZED: &str = "auth: unauthorized";

/// `GET /info`: resolves the bearer token in `Authorization` to its owner.
pub async fn info(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
    else {
        return api_error(StatusCode::UNAUTHORIZED, UNAUTHORIZED);
    };

    match state.tokens.validate(token).await {
        Ok(owner) => api_ok(owner),
        Err(TokenError::Invalid) => api_error(StatusCode::UNAUTHORIZED, UNAUTHORIZED),
        Err(TokenError::Store(e)) => {
            tracing::error!(store = %e.store, error = ?e.source, "token lookup failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RevokeQuery {
    pub token: Option<String>,
    pub callback: Option<String>,
}

/// `GET /revoke`: browser logout; always ends on a redirect.
pub async fn revoke(State(state): State<AppState>, Query(q): Query<RevokeQuery>) -> Result<Response, BrokerError> {
    if let Some(token) = q.token.as_deref().filter(|t| !t.is_empty()) {
        state.tokens.revoke(token).await?;
    }
    let callback = q
        .callback
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(&state.config.server.landing_url);
    Ok(found(callback))
}

#[derive(Debug, Deserialize)]
pub struct RevokeBody {
    #[serde(default)]
    pub token: String,
}

/// `POST /revoke`: JSON variant for API callers.
pub async fn revoke_json(State(state): State<AppState>, body: Result<Json<RevokeBody>, JsonRejection>) -> Response {
    let Ok(Json(body)) = body else {
        return api_error(StatusCode::BAD_REQUEST, "invalid request body");
    };
    if let Err(e) = state.tokens.revoke(&body.token).await {
        tracing::error!(store = %e.store, error = ?e.source, "token revoke failed");
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
    }
    api_ok(json!({}))
}
