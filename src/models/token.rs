use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::{format_timestamp, parse_timestamp};

/// A broker bearer token as persisted: only the hash of the plaintext is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = crate::schema::tokens)]
pub struct Token {
    /// base64url (unpadded) SHA-256 of the plaintext token.
    pub id: String,
    pub email: String,
    pub client_id: String,
    pub expires_at: String,
    pub created_at: String,
}

/// Row shape of the legacy token store. It predates client registration,
/// so tokens read back from it carry no client id.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Insertable)]
#[diesel(primary_key(token))]
#[diesel(table_name = crate::schema::user_tokens)]
pub struct LegacyToken {
    pub token: String,
    pub email: String,
    pub expires_at: OffsetDateTime,
}

impl TryFrom<&Token> for LegacyToken {
    type Error = time::error::Parse;

    fn try_from(t: &Token) -> Result<Self, Self::Error> {
        Ok(Self {
            token: t.id.clone(),
            email: t.email.clone(),
            expires_at: parse_timestamp(&t.expires_at)?,
        })
    }
}

impl From<LegacyToken> for Token {
    fn from(t: LegacyToken) -> Self {
        Self {
            id: t.token,
            email: t.email,
            client_id: String::new(),
            expires_at: format_timestamp(t.expires_at),
            created_at: String::new(),
        }
    }
}
