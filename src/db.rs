pub mod migrations;
pub mod pg;
pub mod sqlite;
