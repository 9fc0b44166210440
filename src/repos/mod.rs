use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DbCfg;
use crate::models::{
    oauth2_client::OAuth2Client,
    oauth2_code::OAuth2Code,
    session::Session,
    token::Token,
};

/// Durable store for the short-lived flow state and the client registry.
///
/// All `*_after` / `*_before` arguments are timestamps produced by
/// [`crate::models::format_timestamp`].
#[async_trait]
pub trait BrokerRepo: Send + Sync {
    // Sessions
    async fn insert_session(&self, session: Session) -> anyhow::Result<()>;
    /// Reads and deletes the session in one operation if it was created after `created_after`.
    async fn take_session(&self, id: &str, created_after: &str) -> anyhow::Result<Option<Session>>;
    async fn delete_sessions_before(&self, cutoff: &str) -> anyhow::Result<usize>;

    // OAuth2 clients
    async fn find_client(&self, id: &str) -> anyhow::Result<Option<OAuth2Client>>;
    async fn save_client(&self, client: OAuth2Client) -> anyhow::Result<()>;

    // Exchange codes
    async fn insert_code(&self, code: OAuth2Code) -> anyhow::Result<()>;
    /// Reads and deletes the code owned by `client_id` if it was created after `created_after`.
    async fn take_code(&self, id: &str, client_id: &str, created_after: &str) -> anyhow::Result<Option<OAuth2Code>>;
    async fn delete_codes_before(&self, cutoff: &str) -> anyhow::Result<usize>;

    // Accounts
    /// Accounts without a row are active.
    async fn is_account_active(&self, email: &str) -> anyhow::Result<bool>;
    async fn set_account_active(&self, email: &str, active: bool) -> anyhow::Result<()>;
}

/// Persistence for bearer tokens, keyed by token hash.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    async fn insert_token(&self, token: Token) -> anyhow::Result<()>;
    /// Looks up a token whose `expires_at` is after `now`.
    async fn find_token(&self, hash: &str, now: &str) -> anyhow::Result<Option<Token>>;
    /// Returns the number of rows removed; zero is not an error.
    async fn delete_token(&self, hash: &str) -> anyhow::Result<usize>;
    async fn delete_tokens_expired(&self, now: &str) -> anyhow::Result<usize>;
}

pub mod memory;
pub mod pg;
pub mod sqlite;

/// Opens the durable store named by `url` (`sqlite://…` or `memory://`).
///
/// The same handle serves as the primary token store.
pub fn open_durable(url: &str) -> anyhow::Result<(Arc<dyn BrokerRepo>, Arc<dyn TokenRepo>)> {
    if url.starts_with("memory://") {
        let repo = memory::MemoryRepo::new();
        let broker: Arc<dyn BrokerRepo> = repo.clone();
        let tokens: Arc<dyn TokenRepo> = repo;
        return Ok((broker, tokens));
    }
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        anyhow::bail!("postgres is only supported as the legacy token store");
    }
    let pool = crate::db::sqlite::make_pool(url)?;
    {
        let mut conn = pool.get()?;
        crate::db::migrations::run_sqlite_migrations(&mut conn)?;
    }
    let repo = sqlite::SqliteRepo::new(pool);
    let broker: Arc<dyn BrokerRepo> = repo.clone();
    let tokens: Arc<dyn TokenRepo> = repo;
    Ok((broker, tokens))
}

/// Opens the legacy token store.
pub async fn open_legacy(url: &str, cfg: &DbCfg) -> anyhow::Result<Arc<dyn TokenRepo>> {
    if url.starts_with("memory://") {
        let repo: Arc<dyn TokenRepo> = memory::MemoryRepo::new();
        return Ok(repo);
    }
    let pool = crate::db::pg::make_pool(url, cfg.legacy_pool_size, cfg.legacy_connect_timeout()).await?;
    let repo: Arc<dyn TokenRepo> = pg::PgTokenRepo::new(pool);
    Ok(repo)
}
