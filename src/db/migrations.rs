use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

// Embed all files under migrations/ (path is relative to crate root)
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// The legacy Postgres token store is migrated by its owning deployment, not here.
pub fn run_sqlite_migrations(conn: &mut diesel::sqlite::SqliteConnection) -> anyhow::Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!(e.to_string()))
}
