use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::{
    oauth2_client::OAuth2Client,
    oauth2_code::OAuth2Code,
    session::Session,
    token::Token,
};
use crate::repos::{BrokerRepo, TokenRepo};

/// In-process store used by `memory://` deployments and tests.
#[derive(Default)]
pub struct MemoryRepo {
    sessions: DashMap<String, Session>,
    clients: DashMap<String, OAuth2Client>,
    codes: DashMap<(String, String), OAuth2Code>,
    tokens: DashMap<String, Token>,
    inactive: DashMap<String, ()>,
}

impl MemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

#[async_trait]
impl BrokerRepo for MemoryRepo {
    async fn insert_session(&self, session: Session) -> anyhow::Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn take_session(&self, id: &str, created_after: &str) -> anyhow::Result<Option<Session>> {
        // Expired rows are left for the sweep, same as the SQL store.
        Ok(self
            .sessions
            .remove_if(id, |_, s| s.created_at.as_str() > created_after)
            .map(|(_, s)| s))
    }

    async fn delete_sessions_before(&self, cutoff: &str) -> anyhow::Result<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.created_at.as_str() > cutoff);
        Ok(before - self.sessions.len())
    }

    async fn find_client(&self, id: &str) -> anyhow::Result<Option<OAuth2Client>> {
        Ok(self.clients.get(id).map(|c| c.value().clone()))
    }

    async fn save_client(&self, client: OAuth2Client) -> anyhow::Result<()> {
        self.clients.insert(client.id.clone(), client);
        Ok(())
    }

    async fn insert_code(&self, code: OAuth2Code) -> anyhow::Result<()> {
        self.codes.insert((code.id.clone(), code.client_id.clone()), code);
        Ok(())
    }

    async fn take_code(&self, id: &str, client_id: &str, created_after: &str) -> anyhow::Result<Option<OAuth2Code>> {
        let key = (id.to_string(), client_id.to_string());
        Ok(self
            .codes
            .remove_if(&key, |_, c| c.created_at.as_str() > created_after)
            .map(|(_, c)| c))
    }

    async fn delete_codes_before(&self, cutoff: &str) -> anyhow::Result<usize> {
        let before = self.codes.len();
        self.codes.retain(|_, c| c.created_at.as_str() > cutoff);
        Ok(before - self.codes.len())
    }

    async fn is_account_active(&self, email: &str) -> anyhow::Result<bool> {
        Ok(!self.inactive.contains_key(email))
    }

    async fn set_account_active(&self, email: &str, active: bool) -> anyhow::Result<()> {
        if active {
            self.inactive.remove(email);
        } else {
            self.inactive.insert(email.to_string(), ());
        }
        Ok(())
    }
}

#[async_trait]
impl TokenRepo for MemoryRepo {
    async fn insert_token(&self, token: Token) -> anyhow::Result<()> {
        self.tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn find_token(&self, hash: &str, now: &str) -> anyhow::Result<Option<Token>> {
        Ok(self
            .tokens
            .get(hash)
            .filter(|t| t.expires_at.as_str() > now)
            .map(|t| t.value().clone()))
    }

    async fn delete_token(&self, hash: &str) -> anyhow::Result<usize> {
        Ok(usize::from(self.tokens.remove(hash).is_some()))
    }

    async fn delete_tokens_expired(&self, now: &str) -> anyhow::Result<usize> {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.expires_at.as_str() > now);
        Ok(before - self.tokens.len())
    }
}
