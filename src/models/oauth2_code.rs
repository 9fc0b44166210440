use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(primary_key(id, client_id))]
#[diesel(table_name = crate::schema::oauth2_codes)]
pub struct OAuth2Code {
    pub id: String,
    pub client_id: String,
    pub email: String,
    pub created_at: String,
}
