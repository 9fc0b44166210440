use std::time::Duration;

use diesel_async::{pooled_connection::bb8::Pool, pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};

pub type PgPool = Pool<AsyncPgConnection>;

/// Pool for the legacy token store. `connect_timeout` bounds how long a
/// request waits for a connection before the store call fails.
pub async fn make_pool(database_url: &str, max_size: u32, connect_timeout: Duration) -> anyhow::Result<PgPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(connect_timeout)
        .build(manager)
        .await?;
    Ok(pool)
}
