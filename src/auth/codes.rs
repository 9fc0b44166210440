use std::sync::Arc;

use time::Duration;

use crate::error::{CodeError, StoreError};
use crate::models::{now_timestamp, oauth2_code::OAuth2Code, timestamp_ago};
use crate::repos::BrokerRepo;
use crate::security::generate_code;
use crate::telemetry::Telemetry;

pub const CODE_TTL: Duration = Duration::hours(1);

/// One-time codes handing a resolved email from the callback to `POST /token`.
#[derive(Clone)]
pub struct ExchangeCodes {
    repo: Arc<dyn BrokerRepo>,
    telemetry: Telemetry,
}

impl ExchangeCodes {
    pub fn new(repo: Arc<dyn BrokerRepo>, telemetry: Telemetry) -> Self {
        Self { repo, telemetry }
    }

    pub async fn create(&self, client_id: &str, email: &str) -> Result<String, StoreError> {
        let code = OAuth2Code {
            id: generate_code(),
            client_id: client_id.to_string(),
            email: email.to_string(),
            created_at: now_timestamp(),
        };
        let id = code.id.clone();
        self.telemetry
            .with_latency("oauth2_code_create", self.repo.insert_code(code))
            .await
            .map_err(StoreError::primary)?;
        Ok(id)
    }

    /// Returns the email bound to `code` and burns the code.
    pub async fn redeem(&self, client_id: &str, code: &str) -> Result<String, CodeError> {
        let cutoff = timestamp_ago(CODE_TTL);
        let found = self
            .telemetry
            .with_latency("oauth2_code_get", self.repo.take_code(code, client_id, &cutoff))
            .await
            .map_err(StoreError::primary)?;
        found.map(|c| c.email).ok_or(CodeError::NotFound)
    }

    pub async fn delete_expired(&self) -> Result<usize, StoreError> {
        let cutoff = timestamp_ago(CODE_TTL);
        self.telemetry
            .with_latency("oauth2_code_cleanup", self.repo.delete_codes_before(&cutoff))
            .await
            .map_err(StoreError::primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::memory::MemoryRepo;
    use crate::telemetry::MemorySink;

    #[tokio::test]
    async fn code_round_trip_is_single_use_and_client_bound() {
        let codes = ExchangeCodes::new(MemoryRepo::new(), Telemetry::new(MemorySink::new()));
        let code = codes.create("c1", "a@b.com").await.unwrap();

        assert!(matches!(codes.redeem("c2", &code).await, Err(CodeError::NotFound)));
        assert_eq!(codes.redeem("c1", &code).await.unwrap(), "a@b.com");
        assert!(matches!(codes.redeem("c1", &code).await, Err(CodeError::NotFound)));
    }

    #[tokio::test]
    async fn stale_codes_cannot_be_redeemed() {
        let repo = MemoryRepo::new();
        repo.insert_code(OAuth2Code {
            id: "old".into(),
            client_id: "c1".into(),
            email: "a@b.com".into(),
            created_at: timestamp_ago(Duration::minutes(90)),
        })
        .await
        .unwrap();
        let codes = ExchangeCodes::new(repo, Telemetry::new(MemorySink::new()));
        assert!(matches!(codes.redeem("c1", "old").await, Err(CodeError::NotFound)));
        assert_eq!(codes.delete_expired().await.unwrap(), 1);
    }
}
