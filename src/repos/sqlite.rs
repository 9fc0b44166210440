use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::OptionalExtension;

use crate::db::sqlite::SqlitePool;
use crate::models::{
    account::Account,
    oauth2_client::OAuth2Client,
    oauth2_code::OAuth2Code,
    session::Session,
    token::Token,
};
use crate::repos::{BrokerRepo, TokenRepo};
use crate::schema::{accounts, oauth2_clients, oauth2_codes, sessions, tokens};

pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    pub fn new(pool: SqlitePool) -> Arc<Self> {
        Arc::new(Self { pool })
    }

    async fn run<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> anyhow::Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<T> {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl BrokerRepo for SqliteRepo {
    async fn insert_session(&self, session: Session) -> anyhow::Result<()> {
        self.run(move |conn| {
            diesel::insert_into(sessions::table).values(&session).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn take_session(&self, id: &str, created_after: &str) -> anyhow::Result<Option<Session>> {
        let id = id.to_string();
        let created_after = created_after.to_string();
        self.run(move |conn| {
            let session = conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                use sessions::dsl as s;
                let found = s::sessions
                    .filter(s::id.eq(&id))
                    .filter(s::created_at.gt(&created_after))
                    .first::<Session>(conn)
                    .optional()?;
                if found.is_some() {
                    diesel::delete(s::sessions.filter(s::id.eq(&id))).execute(conn)?;
                }
                Ok(found)
            })?;
            Ok(session)
        })
        .await
    }

    async fn delete_sessions_before(&self, cutoff: &str) -> anyhow::Result<usize> {
        let cutoff = cutoff.to_string();
        self.run(move |conn| {
            use sessions::dsl as s;
            let n = diesel::delete(s::sessions.filter(s::created_at.le(&cutoff))).execute(conn)?;
            Ok(n)
        })
        .await
    }

    async fn find_client(&self, id: &str) -> anyhow::Result<Option<OAuth2Client>> {
        let id = id.to_string();
        self.run(move |conn| {
            let client = oauth2_clients::table
                .find(id)
                .first::<OAuth2Client>(conn)
                .optional()?;
            Ok(client)
        })
        .await
    }

    async fn save_client(&self, client: OAuth2Client) -> anyhow::Result<()> {
        self.run(move |conn| {
            diesel::insert_into(oauth2_clients::table)
                .values(&client)
                .on_conflict(oauth2_clients::id)
                .do_update()
                .set(&client)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn insert_code(&self, code: OAuth2Code) -> anyhow::Result<()> {
        self.run(move |conn| {
            diesel::insert_into(oauth2_codes::table).values(&code).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn take_code(&self, id: &str, client_id: &str, created_after: &str) -> anyhow::Result<Option<OAuth2Code>> {
        let id = id.to_string();
        let client_id = client_id.to_string();
        let created_after = created_after.to_string();
        self.run(move |conn| {
            let code = conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                use oauth2_codes::dsl as c;
                let found = c::oauth2_codes
                    .filter(c::id.eq(&id))
                    .filter(c::client_id.eq(&client_id))
                    .filter(c::created_at.gt(&created_after))
                    .first::<OAuth2Code>(conn)
                    .optional()?;
                if found.is_some() {
                    diesel::delete(
                        c::oauth2_codes
                            .filter(c::id.eq(&id))
                            .filter(c::client_id.eq(&client_id)),
                    )
                    .execute(conn)?;
                }
                Ok(found)
            })?;
            Ok(code)
        })
        .await
    }

    async fn delete_codes_before(&self, cutoff: &str) -> anyhow::Result<usize> {
        let cutoff = cutoff.to_string();
        self.run(move |conn| {
            use oauth2_codes::dsl as c;
            let n = diesel::delete(c::oauth2_codes.filter(c::created_at.le(&cutoff))).execute(conn)?;
            Ok(n)
        })
        .await
    }

    async fn is_account_active(&self, email: &str) -> anyhow::Result<bool> {
        let email = email.to_string();
        self.run(move |conn| {
            let account = accounts::table
                .find(email)
                .first::<Account>(conn)
                .optional()?;
            Ok(account.map_or(true, |a| a.is_active != 0))
        })
        .await
    }

    async fn set_account_active(&self, email: &str, active: bool) -> anyhow::Result<()> {
        let account = Account { email: email.to_string(), is_active: i32::from(active) };
        self.run(move |conn| {
            diesel::insert_into(accounts::table)
                .values(&account)
                .on_conflict(accounts::email)
                .do_update()
                .set(&account)
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TokenRepo for SqliteRepo {
    async fn insert_token(&self, token: Token) -> anyhow::Result<()> {
        self.run(move |conn| {
            diesel::insert_into(tokens::table).values(&token).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn find_token(&self, hash: &str, now: &str) -> anyhow::Result<Option<Token>> {
        let hash = hash.to_string();
        let now = now.to_string();
        self.run(move |conn| {
            use tokens::dsl as t;
            let token = t::tokens
                .filter(t::id.eq(&hash))
                .filter(t::expires_at.gt(&now))
                .first::<Token>(conn)
                .optional()?;
            Ok(token)
        })
        .await
    }

    async fn delete_token(&self, hash: &str) -> anyhow::Result<usize> {
        let hash = hash.to_string();
        self.run(move |conn| {
            use tokens::dsl as t;
            let n = diesel::delete(t::tokens.filter(t::id.eq(&hash))).execute(conn)?;
            Ok(n)
        })
        .await
    }

    async fn delete_tokens_expired(&self, now: &str) -> anyhow::Result<usize> {
        let now = now.to_string();
        self.run(move |conn| {
            use tokens::dsl as t;
            let n = diesel::delete(t::tokens.filter(t::expires_at.le(&now))).execute(conn)?;
            Ok(n)
        })
        .await
    }
}
