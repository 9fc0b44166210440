use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(primary_key(email))]
#[diesel(table_name = crate::schema::accounts)]
pub struct Account {
    pub email: String,
    pub is_active: i32,
}
