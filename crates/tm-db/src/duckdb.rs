//! DuckDB-backed session provider

use crate::error::{DbError, DbResult};
use crate::session::Session;
use crate::traits::Database;
use duckdb::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A single DuckDB connection shared behind a mutex.
///
/// Every [`Session`] holds the lock, so apply runs and status checks against
/// the same backend never interleave.
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl DuckDbBackend {
    /// Open a throwaway in-memory database.
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Open (or create) a database file.
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open `path`, treating `:memory:` as an in-memory database.
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }
}

impl Database for DuckDbBackend {
    fn session(&self) -> DbResult<Session<'_>> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
        Ok(Session::new(guard))
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
