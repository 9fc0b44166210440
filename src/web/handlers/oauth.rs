use axum::{
    extract::{Form, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    error::{BrokerError, StoreError},
    web::required,
};

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Long-lived opaque bearer token; there is no refresh grant.
    pub refresh_token: String,
    pub token_type: &'static str,
}

/// `POST /token`: a registered client redeems an exchange code for a bearer token.
pub async fn token(State(state): State<AppState>, Form(req): Form<TokenRequest>) -> Result<Response, BrokerError> {
    let client_id = required(&req.client_id, "Missing client_id parameter")?;
    let client_secret = required(&req.client_secret, "Missing client_secret parameter")?;
    let code = required(&req.code, "Missing code parameter")?;

    let client = state.clients.authenticate(client_id, client_secret).await?;
    let email = state.codes.redeem(&client.id, code).await?;

    let active = state
        .telemetry
        .with_latency("account_get", state.repo.is_account_active(&email))
        .await
        .map_err(StoreError::primary)?;
    if !active {
        tracing::info!(client_id = %client.id, "token refused for inactive account");
        return Err(BrokerError::Forbidden("Account disabled"));
    }

    let refresh_token = state.tokens.issue(&email, &client.id).await?;
    Ok(Json(TokenResponse { refresh_token, token_type: "Bearer" }).into_response())
}
