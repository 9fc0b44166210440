use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::OptionalExtension;
use diesel_async::RunQueryDsl;
use time::OffsetDateTime;

use crate::models::parse_timestamp;
use crate::models::token::{LegacyToken, Token};
use crate::repos::TokenRepo;
use crate::schema::user_tokens;

/// Token store of the pre-migration deployment. `expires_at` is a
/// `timestamptz` there, so text timestamps are converted at this boundary.
pub struct PgTokenRepo {
    pool: crate::db::pg::PgPool,
}

impl PgTokenRepo {
    pub fn new(pool: crate::db::pg::PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

fn instant(now: &str) -> anyhow::Result<OffsetDateTime> {
    parse_timestamp(now).with_context(|| format!("invalid timestamp {now:?}"))
}

#[async_trait]
impl TokenRepo for PgTokenRepo {
    async fn insert_token(&self, token: Token) -> anyhow::Result<()> {
        let row = LegacyToken::try_from(&token).context("token expiry")?;
        let mut conn = self.pool.get().await.context("legacy pool")?;
        diesel::insert_into(user_tokens::table)
            .values(&row)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn find_token(&self, hash: &str, now: &str) -> anyhow::Result<Option<Token>> {
        use user_tokens::dsl as ut;
        let now = instant(now)?;
        let mut conn = self.pool.get().await.context("legacy pool")?;
        let row = ut::user_tokens
            .filter(ut::token.eq(hash))
            .filter(ut::expires_at.gt(now))
            .first::<LegacyToken>(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Token::from))
    }

    async fn delete_token(&self, hash: &str) -> anyhow::Result<usize> {
        use user_tokens::dsl as ut;
        let mut conn = self.pool.get().await.context("legacy pool")?;
        let n = diesel::delete(ut::user_tokens.filter(ut::token.eq(hash)))
            .execute(&mut conn)
            .await?;
        Ok(n)
    }

    async fn delete_tokens_expired(&self, now: &str) -> anyhow::Result<usize> {
        use user_tokens::dsl as ut;
        let now = instant(now)?;
        let mut conn = self.pool.get().await.context("legacy pool")?;
        let n = diesel::delete(ut::user_tokens.filter(ut::expires_at.le(now)))
            .execute(&mut conn)
            .await?;
        Ok(n)
    }
}
