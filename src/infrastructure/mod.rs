pub mod persistence;

pub use persistence::{Database, SqliteRawStore};
