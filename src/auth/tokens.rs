use std::sync::Arc;

use serde::Serialize;
use time::Duration;

use crate::auth::google::IdentityProvider;
use crate::error::{StoreError, StoreName, TokenError};
use crate::models::{format_timestamp, now_timestamp, token::Token};
use crate::repos::TokenRepo;
use crate::security::{generate_token, hash_token, ParsedToken};
use crate::telemetry::Telemetry;

pub const TOKEN_TTL: Duration = Duration::days(7);

/// Which token stores a deployment writes to, and which failures are fatal.
///
/// While tokens migrate off the legacy database both stores are configured:
/// the primary is authoritative and the legacy store is written best-effort.
/// Once only one store is left its failures are always fatal.
#[derive(Clone)]
pub struct TokenStores {
    primary: Option<Arc<dyn TokenRepo>>,
    legacy: Option<Arc<dyn TokenRepo>>,
    telemetry: Telemetry,
}

impl TokenStores {
    pub fn primary_only(primary: Arc<dyn TokenRepo>, telemetry: Telemetry) -> Self {
        Self { primary: Some(primary), legacy: None, telemetry }
    }

    pub fn dual(primary: Arc<dyn TokenRepo>, legacy: Arc<dyn TokenRepo>, telemetry: Telemetry) -> Self {
        Self { primary: Some(primary), legacy: Some(legacy), telemetry }
    }

    pub fn legacy_only(legacy: Arc<dyn TokenRepo>, telemetry: Telemetry) -> Self {
        Self { primary: None, legacy: Some(legacy), telemetry }
    }

    fn configured(&self) -> impl Iterator<Item = (StoreName, &Arc<dyn TokenRepo>)> + '_ {
        [(StoreName::Primary, self.primary.as_ref()), (StoreName::Legacy, self.legacy.as_ref())]
            .into_iter()
            .filter_map(|(name, repo)| repo.map(|r| (name, r)))
    }

    pub async fn insert(&self, token: Token) -> Result<(), StoreError> {
        if let Some(primary) = &self.primary {
            self.telemetry
                .with_latency("token_insert.primary", primary.insert_token(token.clone()))
                .await
                .map_err(StoreError::primary)?;
        }
        if let Some(legacy) = &self.legacy {
            let res = self
                .telemetry
                .with_latency("token_insert.legacy", legacy.insert_token(token))
                .await;
            if let Err(e) = res {
                if self.primary.is_none() {
                    return Err(StoreError::new(StoreName::Legacy, e));
                }
                tracing::warn!(store = %StoreName::Legacy, error = ?e, "token write failed, continuing with primary");
            }
        }
        Ok(())
    }

    pub async fn find(&self, hash: &str, now: &str) -> Result<Option<Token>, StoreError> {
        if let Some(primary) = &self.primary {
            let found = self
                .telemetry
                .with_latency("token_find.primary", primary.find_token(hash, now))
                .await
                .map_err(StoreError::primary)?;
            if found.is_some() {
                return Ok(found);
            }
        }
        match &self.legacy {
            Some(legacy) => self
                .telemetry
                .with_latency("token_find.legacy", legacy.find_token(hash, now))
                .await
                .map_err(|e| StoreError::new(StoreName::Legacy, e)),
            None => Ok(None),
        }
    }

    /// Deletes from every configured store; a missing row is not an error.
    pub async fn delete(&self, hash: &str) -> Result<(), StoreError> {
        let telemetry = &self.telemetry;
        let delete_from = |name: StoreName, repo: Option<Arc<dyn TokenRepo>>| async move {
            let Some(repo) = repo else { return Ok(()) };
            let metric = format!("token_delete.{name}");
            telemetry
                .with_latency(&metric, repo.delete_token(hash))
                .await
                .map(|_| ())
                .map_err(|e| StoreError::new(name, e))
        };
        let (primary, legacy) = tokio::join!(
            delete_from(StoreName::Primary, self.primary.clone()),
            delete_from(StoreName::Legacy, self.legacy.clone()),
        );
        // only one error is returned
        if let (Err(_), Err(e)) = (&primary, &legacy) {
            tracing::error!(store = %e.store, error = ?e.source, "token delete failed");
        }
        primary.and(legacy)
    }

    /// Best-effort sweep of expired rows; returns how many were removed.
    pub async fn delete_expired(&self, now: &str) -> usize {
        let mut removed = 0;
        for (name, repo) in self.configured() {
            let metric = format!("token_cleanup.{name}");
            match self.telemetry.with_latency(&metric, repo.delete_tokens_expired(now)).await {
                Ok(n) => removed += n,
                Err(e) => tracing::warn!(store = %name, error = ?e, "expired token sweep failed"),
            }
        }
        removed
    }
}

/// Identity behind a valid bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenOwner {
    pub email: String,
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Clone)]
pub struct TokenService {
    stores: TokenStores,
    provider: Arc<dyn IdentityProvider>,
    telemetry: Telemetry,
}

impl TokenService {
    pub fn new(stores: TokenStores, provider: Arc<dyn IdentityProvider>, telemetry: Telemetry) -> Self {
        Self { stores, provider, telemetry }
    }

    /// Mints a token and returns the plaintext; only its hash is persisted.
    pub async fn issue(&self, email: &str, client_id: &str) -> Result<String, StoreError> {
        let plaintext = generate_token();
        let now = time::OffsetDateTime::now_utc();
        let token = Token {
            id: hash_token(&plaintext),
            email: email.to_string(),
            client_id: client_id.to_string(),
            expires_at: format_timestamp(now + TOKEN_TTL),
            created_at: format_timestamp(now),
        };
        self.stores.insert(token).await?;
        Ok(plaintext)
    }

    pub async fn validate(&self, plaintext: &str) -> Result<TokenOwner, TokenError> {
        match ParsedToken::parse(plaintext) {
            ParsedToken::Broker { hash } => {
                let token = self.stores.find(&hash, &now_timestamp()).await?;
                token
                    .map(|t| TokenOwner {
                        email: t.email,
                        client_id: Some(t.client_id).filter(|c| !c.is_empty()),
                    })
                    .ok_or(TokenError::Invalid)
            }
            ParsedToken::GoogleAccess(access_token) => {
                let res = self
                    .telemetry
                    .with_latency("token_introspect.google", self.provider.introspect(&access_token))
                    .await;
                match res {
                    Ok(Some(email)) => Ok(TokenOwner { email, client_id: None }),
                    Ok(None) => Err(TokenError::Invalid),
                    Err(e) => {
                        tracing::warn!(error = ?e, "access token introspection failed");
                        Err(TokenError::Invalid)
                    }
                }
            }
            ParsedToken::Malformed => Err(TokenError::Invalid),
        }
    }

    pub async fn revoke(&self, plaintext: &str) -> Result<(), StoreError> {
        let plaintext = plaintext.trim();
        if plaintext.is_empty() {
            return Ok(());
        }
        self.stores.delete(&hash_token(plaintext)).await
    }

    pub async fn delete_expired(&self) -> usize {
        self.stores.delete_expired(&now_timestamp()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use crate::repos::memory::MemoryRepo;
    use crate::telemetry::MemorySink;
    use async_trait::async_trait;
    use url::Url;

    struct NoProvider;

    #[async_trait]
    impl IdentityProvider for NoProvider {
        fn authorize_url(&self, _state: &str) -> Url {
            Url::parse("https://idp.example/auth").unwrap()
        }
        async fn exchange_code(&self, _code: &str) -> Result<String, UpstreamError> {
            Err(UpstreamError::MissingIdToken)
        }
        async fn introspect(&self, access_token: &str) -> Result<Option<String>, UpstreamError> {
            Ok((access_token == "ya29.good").then(|| "g@b.com".to_string()))
        }
    }

    /// Token store whose every call fails.
    struct BrokenRepo;

    #[async_trait]
    impl TokenRepo for BrokenRepo {
        async fn insert_token(&self, _token: Token) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
        async fn find_token(&self, _hash: &str, _now: &str) -> anyhow::Result<Option<Token>> {
            anyhow::bail!("connection refused")
        }
        async fn delete_token(&self, _hash: &str) -> anyhow::Result<usize> {
            anyhow::bail!("connection refused")
        }
        async fn delete_tokens_expired(&self, _now: &str) -> anyhow::Result<usize> {
            anyhow::bail!("connection refused")
        }
    }

    fn service(stores: TokenStores) -> TokenService {
        TokenService::new(stores, Arc::new(NoProvider), Telemetry::new(MemorySink::new()))
    }

    #[tokio::test]
    async fn issued_tokens_validate_until_revoked() {
        let telemetry = Telemetry::new(MemorySink::new());
        let tokens = service(TokenStores::primary_only(MemoryRepo::new(), telemetry));
        let token = tokens.issue("a@b.com", "c1").await.unwrap();

        let owner = tokens.validate(&token).await.unwrap();
        assert_eq!(owner, TokenOwner { email: "a@b.com".into(), client_id: Some("c1".into()) });

        let mut chars: Vec<char> = token.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let mutated: String = chars.into_iter().collect();
        assert!(matches!(tokens.validate(&mutated).await, Err(TokenError::Invalid)));

        tokens.revoke(&token).await.unwrap();
        assert!(matches!(tokens.validate(&token).await, Err(TokenError::Invalid)));
        tokens.revoke(&token).await.unwrap();
        tokens.revoke("deploys-api.never-issued").await.unwrap();
    }

    #[tokio::test]
    async fn dual_write_tolerates_legacy_failure() {
        let primary = MemoryRepo::new();
        let sink = MemorySink::new();
        let telemetry = Telemetry::new(sink.clone());
        let tokens = service(TokenStores::dual(primary.clone(), Arc::new(BrokenRepo), telemetry));

        let token = tokens.issue("a@b.com", "c1").await.unwrap();
        assert_eq!(primary.token_count(), 1);
        assert!(tokens.validate(&token).await.is_ok());
        assert_eq!(sink.latency_names(), vec!["token_insert.primary", "token_insert.legacy", "token_find.primary"]);

        let err = tokens.revoke(&token).await.unwrap_err();
        assert_eq!(err.store, StoreName::Legacy);
        assert_eq!(primary.token_count(), 0);
    }

    #[tokio::test]
    async fn sole_legacy_store_failure_is_fatal() {
        let telemetry = Telemetry::new(MemorySink::new());
        let tokens = service(TokenStores::legacy_only(Arc::new(BrokenRepo), telemetry));
        let err = tokens.issue("a@b.com", "c1").await.unwrap_err();
        assert_eq!(err.store, StoreName::Legacy);
    }

    #[tokio::test]
    async fn dual_find_falls_back_to_legacy() {
        let primary = MemoryRepo::new();
        let legacy = MemoryRepo::new();
        let telemetry = Telemetry::new(MemorySink::new());
        let legacy_only = service(TokenStores::legacy_only(legacy.clone(), telemetry.clone()));
        let token = legacy_only.issue("old@b.com", "c1").await.unwrap();

        let tokens = service(TokenStores::dual(primary, legacy, telemetry));
        assert_eq!(tokens.validate(&token).await.unwrap().email, "old@b.com");
    }

    #[tokio::test]
    async fn access_tokens_are_introspected_and_junk_is_rejected() {
        let telemetry = Telemetry::new(MemorySink::new());
        let tokens = service(TokenStores::primary_only(MemoryRepo::new(), telemetry));
        assert_eq!(
            tokens.validate("ya29.good").await.unwrap(),
            TokenOwner { email: "g@b.com".into(), client_id: None }
        );
        assert!(matches!(tokens.validate("ya29.bad").await, Err(TokenError::Invalid)));
        assert!(matches!(tokens.validate("gho_123").await, Err(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn expired_sweep_spans_stores() {
        let primary = MemoryRepo::new();
        let telemetry = Telemetry::new(MemorySink::new());
        primary
            .insert_token(Token {
                id: "h".into(),
                email: "a@b.com".into(),
                client_id: "c1".into(),
                expires_at: crate::models::timestamp_ago(Duration::minutes(1)),
                created_at: crate::models::timestamp_ago(Duration::days(8)),
            })
            .await
            .unwrap();
        let tokens = service(TokenStores::dual(primary, Arc::new(BrokenRepo), telemetry));
        assert_eq!(tokens.delete_expired().await, 1);
    }
}
