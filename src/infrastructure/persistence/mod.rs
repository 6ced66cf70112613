pub mod database;
pub mod raw_store_sqlite;

pub use database::Database;
pub use raw_store_sqlite::SqliteRawStore;
