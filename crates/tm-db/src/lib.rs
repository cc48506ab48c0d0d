//! tm-db - Database abstraction for Tidemark
//!
//! A small async [`Database`] trait with DuckDB and SQLite backends. The
//! migration engine only needs to run statements and read back generic rows,
//! so that is all the trait exposes.

pub mod duckdb;
pub mod error;
pub mod row;
pub mod sqlite;
pub mod traits;

pub use self::duckdb::DuckDbBackend;
pub use self::sqlite::SqliteBackend;
pub use error::{DbError, DbResult};
pub use row::{Row, Value};
pub use traits::Database;
