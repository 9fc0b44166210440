use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Identifies a backing store in logs, telemetry and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreName {
    Primary,
    Legacy,
    Cache,
}

impl StoreName {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreName::Primary => "primary",
            StoreName::Legacy => "legacy",
            StoreName::Cache => "cache",
        }
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{store} store: {source:#}")]
pub struct StoreError {
    pub store: StoreName,
    #[source]
    pub source: anyhow::Error,
}

impl StoreError {
    pub fn new(store: StoreName, source: anyhow::Error) -> Self {
        Self { store, source }
    }

    pub fn primary(source: anyhow::Error) -> Self {
        Self::new(StoreName::Primary, source)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("session state mismatch")]
    StateMismatch,
    #[error("invalid callback url")]
    InvalidCallbackUrl,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("oauth2: client not found")]
    NotFound,
    #[error("oauth2: invalid client secret")]
    InvalidSecret,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    #[error("oauth2: code not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("auth: unauthorized")]
    Invalid,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures talking to the identity provider; never shown to end users.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity provider returned status {0}")]
    Status(u16),
    #[error("identity provider response missing id_token")]
    MissingIdToken,
    #[error("malformed id_token: {0}")]
    MalformedIdToken(String),
    #[error("identity provider response missing email")]
    MissingEmail,
}

/// Errors surfaced by the HTTP handlers, mapped onto plain-text responses.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SessionError> for BrokerError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound => BrokerError::BadRequest("Invalid session cookie"),
            SessionError::StateMismatch => BrokerError::BadRequest("Mismatch state"),
            SessionError::InvalidCallbackUrl => BrokerError::BadRequest("Invalid callback parameter"),
            SessionError::Store(e) => BrokerError::Store(e),
        }
    }
}

impl From<ClientError> for BrokerError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::NotFound => BrokerError::BadRequest("Invalid client_id parameter"),
            ClientError::InvalidSecret => BrokerError::BadRequest("Invalid client_secret parameter"),
            ClientError::Store(e) => BrokerError::Store(e),
        }
    }
}

impl From<CodeError> for BrokerError {
    fn from(e: CodeError) -> Self {
        match e {
            CodeError::NotFound => BrokerError::BadRequest("Invalid code parameter"),
            CodeError::Store(e) => BrokerError::Store(e),
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        match self {
            BrokerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            BrokerError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg).into_response(),
            BrokerError::Store(e) => {
                tracing::error!(store = %e.store, error = ?e.source, "store operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
