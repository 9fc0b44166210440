use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::auth::cache::{client_cache_key, CachedClient, ClientCache};
use crate::config::CacheCfg;
use crate::error::{ClientError, StoreError, StoreName};
use crate::models::oauth2_client::OAuth2Client;
use crate::repos::BrokerRepo;
use crate::tasks::BackgroundTasks;
use crate::telemetry::Telemetry;

/// A registered `redirect_uri` pattern: literal text plus `*` wildcards,
/// matched against the whole candidate.
#[derive(Debug, Clone)]
pub struct RedirectPattern(Regex);

impl RedirectPattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let body = pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
        Regex::new(&format!("^{body}$")).map(Self)
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.0.is_match(candidate)
    }
}

/// Read-through lookup of OAuth2 clients.
#[derive(Clone)]
pub struct ClientRegistry {
    repo: Arc<dyn BrokerRepo>,
    cache: Arc<dyn ClientCache>,
    tasks: BackgroundTasks,
    telemetry: Telemetry,
    found_ttl: Duration,
    missing_ttl: Duration,
}

impl ClientRegistry {
    pub fn new(
        repo: Arc<dyn BrokerRepo>,
        cache: Arc<dyn ClientCache>,
        tasks: BackgroundTasks,
        telemetry: Telemetry,
        cfg: &CacheCfg,
    ) -> Self {
        Self {
            repo,
            cache,
            tasks,
            telemetry,
            found_ttl: Duration::from_secs(cfg.found_ttl_secs),
            missing_ttl: Duration::from_secs(cfg.missing_ttl_secs),
        }
    }

    pub async fn lookup(&self, client_id: &str) -> Result<OAuth2Client, ClientError> {
        let key = client_cache_key(client_id);
        match self.telemetry.with_latency("oauth2_client_cache_get", self.cache.get(&key)).await {
            Ok(Some(CachedClient::Found(client))) => return Ok(client),
            Ok(Some(CachedClient::Missing)) => return Err(ClientError::NotFound),
            Ok(None) => {}
            // the durable store still answers
            Err(e) => tracing::warn!(store = %StoreName::Cache, error = ?e, "client cache read failed"),
        }

        let found = self
            .telemetry
            .with_latency("oauth2_client_get", self.repo.find_client(client_id))
            .await
            .map_err(StoreError::primary)?;

        let (entry, ttl) = match &found {
            Some(client) => (CachedClient::Found(client.clone()), self.found_ttl),
            None => (CachedClient::Missing, self.missing_ttl),
        };
        let cache = self.cache.clone();
        self.tasks.spawn(async move {
            if let Err(e) = cache.put(&key, entry, ttl).await {
                tracing::warn!(store = %StoreName::Cache, error = ?e, "client cache write failed");
            }
        });

        found.ok_or(ClientError::NotFound)
    }

    /// Looks the client up and checks its secret.
    // Plain comparison, kept as deployed; hashing and constant-time compare are pending review.
    pub async fn authenticate(&self, client_id: &str, secret: &str) -> Result<OAuth2Client, ClientError> {
        let client = self.lookup(client_id).await?;
        if client.secret != secret {
            return Err(ClientError::InvalidSecret);
        }
        Ok(client)
    }

    /// Checks `redirect_uri` against the client's registered pattern.
    pub fn redirect_allowed(client: &OAuth2Client, redirect_uri: &str) -> bool {
        match RedirectPattern::compile(&client.redirect_uri) {
            Ok(pattern) => pattern.matches(redirect_uri),
            Err(e) => {
                tracing::warn!(client_id = %client.id, error = ?e, "invalid redirect pattern");
                false
            }
        }
    }
}
