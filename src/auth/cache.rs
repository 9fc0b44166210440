use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::oauth2_client::OAuth2Client;

pub fn client_cache_key(client_id: &str) -> String {
    format!("deploys--auth|oauth2_client|{client_id}")
}

/// What the cache remembers about a client id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedClient {
    Found(OAuth2Client),
    Missing,
}

/// Shared cache in front of the client registry.
#[async_trait]
pub trait ClientCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<CachedClient>>;
    async fn put(&self, key: &str, value: CachedClient, ttl: Duration) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct MemoryClientCache {
    entries: DashMap<String, (CachedClient, Instant)>,
}

impl MemoryClientCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientCache for MemoryClientCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<CachedClient>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (value, expires) = entry.value();
            if *expires > now {
                return Ok(Some(value.clone()));
            }
        }
        self.entries.remove_if(key, |_, (_, expires)| *expires <= now);
        Ok(None)
    }

    async fn put(&self, key: &str, value: CachedClient, ttl: Duration) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_expire() {
        let cache = MemoryClientCache::new();
        let key = client_cache_key("c1");
        assert_eq!(key, "deploys--auth|oauth2_client|c1");

        cache.put(&key, CachedClient::Missing, Duration::from_millis(20)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(CachedClient::Missing));
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }
}
