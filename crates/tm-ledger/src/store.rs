//! Append-only migration history table.
//!
//! Every apply attempt adds one row; rows are never updated or deleted.
//! "Applied" is derived: a script counts as applied for a tenant once any of
//! its rows has status `success`.

use crate::error::{LedgerError, LedgerResult, LedgerResultExt};
use duckdb::Connection;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tm_core::LedgerConfig;

/// Outcome recorded for one apply attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Error,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Error => "error",
        }
    }

    /// Parse a stored status value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(AttemptStatus::Success),
            "error" => Some(AttemptStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest attempt for one script name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedMigration {
    pub name: String,
    pub checksum: String,
    pub execution_time_ms: Option<f64>,
    pub status: AttemptStatus,
}

/// One full ledger row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub name: String,
    pub tenant_id: String,
    /// Timestamp as rendered by DuckDB, e.g. `2024-05-01 12:00:00.123`
    pub applied_at: String,
    pub checksum: String,
    pub execution_time_ms: Option<f64>,
    pub status: AttemptStatus,
    pub error_message: Option<String>,
}

/// Row to append to the ledger.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub name: String,
    pub tenant_id: String,
    pub checksum: String,
    pub execution_time_ms: f64,
    pub status: AttemptStatus,
    pub error_message: Option<String>,
}

impl NewAttempt {
    pub fn success(name: &str, tenant_id: &str, checksum: &str, execution_time_ms: f64) -> Self {
        Self {
            name: name.to_string(),
            tenant_id: tenant_id.to_string(),
            checksum: checksum.to_string(),
            execution_time_ms,
            status: AttemptStatus::Success,
            error_message: None,
        }
    }

    pub fn failure(
        name: &str,
        tenant_id: &str,
        checksum: &str,
        execution_time_ms: f64,
        error_message: String,
    ) -> Self {
        Self {
            name: name.to_string(),
            tenant_id: tenant_id.to_string(),
            checksum: checksum.to_string(),
            execution_time_ms,
            status: AttemptStatus::Error,
            error_message: Some(error_message),
        }
    }
}

/// Reads and appends rows of the ledger table named by a [`LedgerConfig`].
///
/// Identifiers are interpolated into SQL, so they must have passed
/// [`tm_core::Config::validate`].
#[derive(Debug, Clone)]
pub struct LedgerStore {
    schema: String,
    table: String,
}

impl LedgerStore {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            schema: config.schema.clone(),
            table: config.table.clone(),
        }
    }

    /// Schema-qualified ledger table name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    fn sequence_name(&self) -> String {
        format!("{}.{}_id_seq", self.schema, self.table)
    }

    /// Whether the ledger table exists.
    pub fn exists(&self, conn: &Connection) -> LedgerResult<bool> {
        Ok(tm_db::relation_exists(conn, &self.schema, &self.table)?)
    }

    /// Create the ledger table if it is absent. Returns `true` if it was created.
    pub fn ensure_table(&self, conn: &Connection) -> LedgerResult<bool> {
        if self.exists(conn)? {
            return Ok(false);
        }

        let mut ddl = String::new();
        if self.schema != "main" {
            ddl.push_str(&format!("CREATE SCHEMA IF NOT EXISTS {};\n", self.schema));
        }
        ddl.push_str(&format!(
            "CREATE SEQUENCE IF NOT EXISTS {seq};
             CREATE TABLE {table} (
                 id                BIGINT PRIMARY KEY DEFAULT nextval('{seq}'),
                 name              VARCHAR NOT NULL,
                 tenant_id         VARCHAR NOT NULL,
                 applied_at        TIMESTAMP NOT NULL DEFAULT now(),
                 checksum          VARCHAR NOT NULL,
                 execution_time_ms DOUBLE,
                 status            VARCHAR NOT NULL CHECK (status IN ('success', 'error')),
                 error_message     VARCHAR
             );",
            seq = self.sequence_name(),
            table = self.qualified_name(),
        ));

        conn.execute_batch(&ddl)
            .ledger_context(&format!("create {}", self.qualified_name()))?;
        log::info!("Created migration ledger {}", self.qualified_name());
        Ok(true)
    }

    /// Latest attempt per script name for `tenant`, in order of first attempt.
    pub fn applied_for(&self, conn: &Connection, tenant: &str) -> LedgerResult<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT name, checksum, execution_time_ms, status FROM (
                 SELECT name, checksum, execution_time_ms, status,
                        ROW_NUMBER() OVER (PARTITION BY name ORDER BY applied_at DESC, id DESC) AS rn,
                        MIN(id) OVER (PARTITION BY name) AS first_id
                 FROM {}
                 WHERE tenant_id = ?
             ) WHERE rn = 1
             ORDER BY first_id",
            self.qualified_name()
        );
        let mut stmt = conn.prepare(&sql).ledger_context("prepare applied_for")?;
        let rows: Vec<(String, String, Option<f64>, String)> = stmt
            .query_map(duckdb::params![tenant], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .ledger_context("query applied_for")?
            .collect::<Result<Vec<_>, _>>()
            .ledger_context("read applied_for row")?;

        rows.into_iter()
            .map(|(name, checksum, execution_time_ms, status)| {
                Ok(AppliedMigration {
                    name,
                    checksum,
                    execution_time_ms,
                    status: parse_status(&status)?,
                })
            })
            .collect()
    }

    /// Names with at least one `success` row for `tenant`.
    pub fn successful_names(&self, conn: &Connection, tenant: &str) -> LedgerResult<BTreeSet<String>> {
        let sql = format!(
            "SELECT DISTINCT name FROM {} WHERE tenant_id = ? AND status = 'success'",
            self.qualified_name()
        );
        let mut stmt = conn.prepare(&sql).ledger_context("prepare successful_names")?;
        let names = stmt
            .query_map(duckdb::params![tenant], |row| row.get::<_, String>(0))
            .ledger_context("query successful_names")?
            .collect::<Result<BTreeSet<_>, _>>()
            .ledger_context("read successful_names row")?;
        Ok(names)
    }

    /// Checksum of the most recent `success` row per name for `tenant`.
    pub fn latest_success_checksums(
        &self,
        conn: &Connection,
        tenant: &str,
    ) -> LedgerResult<HashMap<String, String>> {
        let sql = format!(
            "SELECT name, checksum FROM (
                 SELECT name, checksum,
                        ROW_NUMBER() OVER (PARTITION BY name ORDER BY applied_at DESC, id DESC) AS rn
                 FROM {}
                 WHERE tenant_id = ? AND status = 'success'
             ) WHERE rn = 1",
            self.qualified_name()
        );
        let mut stmt = conn
            .prepare(&sql)
            .ledger_context("prepare latest_success_checksums")?;
        let checksums = stmt
            .query_map(duckdb::params![tenant], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .ledger_context("query latest_success_checksums")?
            .collect::<Result<HashMap<_, _>, _>>()
            .ledger_context("read latest_success_checksums row")?;
        Ok(checksums)
    }

    /// Every attempt row for `tenant`, oldest first.
    pub fn history(&self, conn: &Connection, tenant: &str) -> LedgerResult<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT id, name, tenant_id, CAST(applied_at AS VARCHAR), checksum,
                    execution_time_ms, status, error_message
             FROM {}
             WHERE tenant_id = ?
             ORDER BY applied_at, id",
            self.qualified_name()
        );
        let mut stmt = conn.prepare(&sql).ledger_context("prepare history")?;
        let rows = stmt
            .query_map(duckdb::params![tenant], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .ledger_context("query history")?
            .collect::<Result<Vec<_>, _>>()
            .ledger_context("read history row")?;

        rows.into_iter()
            .map(
                |(id, name, tenant_id, applied_at, checksum, execution_time_ms, status, error_message)| {
                    Ok(MigrationRecord {
                        id,
                        name,
                        tenant_id,
                        applied_at,
                        checksum,
                        execution_time_ms,
                        status: parse_status(&status)?,
                        error_message,
                    })
                },
            )
            .collect()
    }

    /// Append one attempt row.
    pub fn record_attempt(&self, conn: &Connection, attempt: &NewAttempt) -> LedgerResult<()> {
        let sql = format!(
            "INSERT INTO {} (name, tenant_id, checksum, execution_time_ms, status, error_message)
             VALUES (?, ?, ?, ?, ?, ?)",
            self.qualified_name()
        );
        conn.execute(
            &sql,
            duckdb::params![
                attempt.name,
                attempt.tenant_id,
                attempt.checksum,
                attempt.execution_time_ms,
                attempt.status.as_str(),
                attempt.error_message,
            ],
        )
        .ledger_context(&format!("insert {} row for '{}'", attempt.status, attempt.name))?;
        Ok(())
    }
}

fn parse_status(value: &str) -> LedgerResult<AttemptStatus> {
    AttemptStatus::parse(value)
        .ok_or_else(|| LedgerError::QueryError(format!("unknown ledger status '{value}'")))
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
