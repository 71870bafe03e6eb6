//! tm-db - Database session layer for Tidemark
//!
//! This crate provides the `Database` trait the migration engine consumes
//! and its DuckDB implementation. A [`Session`] is an exclusively-held
//! connection with a scoped `BEGIN`/`COMMIT`/`ROLLBACK` helper.

pub mod duckdb;
pub mod error;
pub mod session;
pub mod traits;

pub use self::duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use session::{relation_exists, Session};
pub use traits::Database;
