use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = crate::schema::oauth2_clients)]
pub struct OAuth2Client {
    pub id: String,
    pub secret: String,
    /// Glob pattern, `*` matches any substring.
    pub redirect_uri: String,
    pub created_at: String,
}
