use std::sync::Arc;

use time::Duration;
use tower_cookies::{Cookie, Cookies};
use url::Url;

use crate::error::{SessionError, StoreError};
use crate::models::{now_timestamp, session::Session, timestamp_ago};
use crate::repos::BrokerRepo;
use crate::security::{generate_session_id, generate_state};
use crate::telemetry::Telemetry;

pub const SESSION_COOKIE: &str = "s";
pub const SESSION_TTL: Duration = Duration::hours(1);

/// Returned by [`SessionManager::create`]: the cookie value and the nonce for the provider.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: String,
    pub state: String,
}

#[derive(Clone)]
pub struct SessionManager {
    repo: Arc<dyn BrokerRepo>,
    telemetry: Telemetry,
}

impl SessionManager {
    pub fn new(repo: Arc<dyn BrokerRepo>, telemetry: Telemetry) -> Self {
        Self { repo, telemetry }
    }

    pub async fn create(
        &self,
        callback_state: &str,
        callback_url: &str,
        client_id: Option<&str>,
    ) -> Result<NewSession, SessionError> {
        if !is_valid_callback_url(callback_url) {
            return Err(SessionError::InvalidCallbackUrl);
        }
        let session = Session {
            id: generate_session_id(),
            client_id: client_id.map(str::to_string),
            state: generate_state(),
            callback_state: callback_state.to_string(),
            callback_url: callback_url.to_string(),
            created_at: now_timestamp(),
        };
        let created = NewSession { id: session.id.clone(), state: session.state.clone() };
        self.telemetry
            .with_latency("session_create", self.repo.insert_session(session))
            .await
            .map_err(StoreError::primary)?;
        Ok(created)
    }

    /// Takes the session out of the store and checks the provider's echoed state.
    /// The session is gone afterwards whatever the outcome.
    pub async fn consume(&self, session_id: &str, expected_state: &str) -> Result<Session, SessionError> {
        let cutoff = timestamp_ago(SESSION_TTL);
        let session = self
            .telemetry
            .with_latency("session_get", self.repo.take_session(session_id, &cutoff))
            .await
            .map_err(StoreError::primary)?
            .ok_or(SessionError::NotFound)?;
        if session.state != expected_state {
            tracing::warn!(client_id = ?session.client_id, "session state mismatch");
            return Err(SessionError::StateMismatch);
        }
        Ok(session)
    }

    pub async fn delete_expired(&self) -> Result<usize, StoreError> {
        let cutoff = timestamp_ago(SESSION_TTL);
        self.telemetry
            .with_latency("session_cleanup", self.repo.delete_sessions_before(&cutoff))
            .await
            .map_err(StoreError::primary)
    }
}

/// Absolute http(s) URL with a non-empty host.
pub fn is_valid_callback_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

pub fn set_session_cookie(cookies: &Cookies, session_id: &str, secure: bool) {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_secure(secure);
    cookies.add(cookie);
}

pub fn session_cookie(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
