use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Correlates an outbound authorization redirect with its callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = crate::schema::sessions)]
pub struct Session {
    pub id: String,
    pub client_id: Option<String>,
    /// Nonce sent to the identity provider.
    pub state: String,
    /// The caller's state, handed back untouched.
    pub callback_state: String,
    pub callback_url: String,
    pub created_at: String,
}
