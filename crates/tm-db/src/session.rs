//! Exclusive database session with scoped transactions.

use crate::error::{DbError, DbResult};
use duckdb::Connection;
use std::sync::MutexGuard;

/// An exclusively-held connection.
///
/// Holding a `Session` blocks every other caller of
/// [`Database::session`](crate::Database::session) on the same provider until
/// it is dropped.
pub struct Session<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> Session<'a> {
    pub(crate) fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    /// Borrow the underlying DuckDB connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute one or more statements outside of an explicit transaction.
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(e.to_string()))
    }

    /// Check whether `schema.table` exists as a table or view.
    pub fn relation_exists(&self, schema: &str, table: &str) -> DbResult<bool> {
        relation_exists(&self.conn, schema, table)
    }

    /// Execute `body` within a `BEGIN` / `COMMIT` transaction, rolling back on
    /// error.
    ///
    /// The body's error is returned unchanged after the rollback. A failed
    /// rollback is logged rather than replacing that error.
    pub fn transaction<F, T, E>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {e}")))?;

        let result = body(&self.conn);

        match &result {
            Ok(_) => {
                if let Err(commit_err) = self.conn.execute_batch("COMMIT") {
                    if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                        log::warn!("ROLLBACK after failed COMMIT also failed: {rollback_err}");
                    }
                    return Err(
                        DbError::TransactionError(format!("COMMIT failed: {commit_err}")).into(),
                    );
                }
            }
            Err(_) => {
                if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                    log::warn!("ROLLBACK failed: {rollback_err}");
                }
            }
        }
        result
    }
}

/// Check whether `schema.table` exists as a table or view.
///
/// Usable from inside a [`Session::transaction`] body, which only sees the
/// raw connection.
pub fn relation_exists(conn: &Connection, schema: &str, table: &str) -> DbResult<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
            duckdb::params![schema, table],
            |row| row.get(0),
        )
        .map_err(|e| DbError::ExecutionError(e.to_string()))?;
    Ok(count > 0)
}
