//! Error types for the migration ledger.

use thiserror::Error;
use tm_core::CoreError;
use tm_db::DbError;

/// Migration ledger errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Configuration or discovery failure (L001).
    #[error("[L001] {0}")]
    Core(#[from] CoreError),

    /// Session or transaction failure (L002).
    #[error("[L002] {0}")]
    Db(#[from] DbError),

    /// Reading or writing the ledger table failed (L003).
    #[error("[L003] Ledger query failed: {0}")]
    QueryError(String),

    /// A pending script could not be read (L004).
    #[error("[L004] Cannot read migration script '{name}': {source}")]
    ScriptRead {
        name: String,
        #[source]
        source: CoreError,
    },

    /// A pending script is not valid UTF-8 (L005).
    #[error("[L005] Migration script '{name}' is not valid UTF-8")]
    ScriptEncoding { name: String },

    /// A statement inside a migration script failed (L006).
    #[error("[L006] Statement {index} of '{name}' failed: {message}")]
    StatementFailed {
        name: String,
        index: usize,
        message: String,
    },

    /// Another apply run holds the run lock (L007).
    #[error("[L007] Another migration run holds the lock {path} ({holder})")]
    LockHeld { path: String, holder: String },

    /// The run lock file could not be opened, locked or written (L008).
    #[error("[L008] Cannot acquire migration run lock {path}: {source}")]
    LockIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// DuckDB driver error with preserved source chain (L009).
    #[error("[L009] DuckDB error")]
    DuckDb(#[source] duckdb::Error),
}

/// Result type alias for [`LedgerError`].
pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<duckdb::Error> for LedgerError {
    fn from(err: duckdb::Error) -> Self {
        LedgerError::DuckDb(err)
    }
}

/// Extension trait for adding ledger query context to DuckDB results.
pub(crate) trait LedgerResultExt<T> {
    /// Map the error to [`LedgerError::QueryError`] prefixed with `context`.
    fn ledger_context(self, context: &str) -> LedgerResult<T>;
}

impl<T> LedgerResultExt<T> for Result<T, duckdb::Error> {
    fn ledger_context(self, context: &str) -> LedgerResult<T> {
        self.map_err(|e| LedgerError::QueryError(format!("{context}: {e}")))
    }
}
