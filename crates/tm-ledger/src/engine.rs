//! Apply engine: runs pending migration scripts in order, one transaction each.
//!
//! A run moves through [`RunPhase`]s:
//!
//! ```text
//! Idle -> Discovering -> ComputingPending -> Applying(0..n) -> Success
//!                                                           -> HaltedOnFailure
//! (any phase) -> FatalError
//! ```
//!
//! A failing statement rolls its script back, appends an `error` row to the
//! ledger and halts the run. Later scripts are not attempted. Errors that
//! prevent the run from starting (missing tenant, missing directory,
//! unreadable script, ledger unavailable) are returned as `Err` and add no
//! ledger rows.

use crate::completion::CompletionFlag;
use crate::drift::{scan_drift, Drift};
use crate::error::{LedgerError, LedgerResult};
use crate::lock::RunLock;
use crate::settings::MigrationSettings;
use crate::status::{MigrationStatus, StatusReporter};
use crate::store::{LedgerStore, NewAttempt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tm_core::{compute_checksum, discover_scripts, split_statements, CoreError, MigrationScript};
use tm_db::{Database, Session};

/// Phase of an apply run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Discovering,
    ComputingPending,
    /// Applying the pending script at this index
    Applying(usize),
    Success,
    HaltedOnFailure,
    FatalError,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Discovering => write!(f, "discovering"),
            RunPhase::ComputingPending => write!(f, "computing pending"),
            RunPhase::Applying(i) => write!(f, "applying #{}", i + 1),
            RunPhase::Success => write!(f, "success"),
            RunPhase::HaltedOnFailure => write!(f, "halted on failure"),
            RunPhase::FatalError => write!(f, "fatal error"),
        }
    }
}

/// How a run that reached the apply loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    HaltedOnFailure,
}

/// The script that stopped a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedScript {
    pub name: String,
    /// Message as stored in the ledger (possibly truncated)
    pub error: String,
    pub execution_time_ms: f64,
}

/// Result of [`MigrationEngine::apply_pending`].
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub tenant: String,
    /// Scripts applied by this run, in apply order
    pub applied: Vec<String>,
    pub failed: Option<FailedScript>,
    /// Already-applied scripts whose content changed
    pub drifted: Vec<Drift>,
    pub outcome: RunOutcome,
    pub elapsed_ms: f64,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }
}

/// Applies pending migration scripts for one tenant against one database.
pub struct MigrationEngine<D: Database> {
    db: Arc<D>,
    settings: MigrationSettings,
    store: LedgerStore,
    completion: CompletionFlag,
}

impl<D: Database> MigrationEngine<D> {
    pub fn new(db: Arc<D>, settings: MigrationSettings) -> Self {
        let store = LedgerStore::new(&settings.ledger);
        Self {
            db,
            settings,
            store,
            completion: CompletionFlag::new(),
        }
    }

    /// Use an externally owned completion flag, e.g. one shared with a
    /// health check.
    pub fn with_completion_flag(mut self, completion: CompletionFlag) -> Self {
        self.completion = completion;
        self
    }

    pub fn completion_flag(&self) -> &CompletionFlag {
        &self.completion
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Read-only reporter over the same database and settings.
    pub fn status_reporter(&self) -> StatusReporter<D> {
        StatusReporter::new(Arc::clone(&self.db), self.settings.clone())
            .with_completion_flag(self.completion.clone())
    }

    /// `true` once a run has finished with nothing left to apply.
    ///
    /// Before any run in this process, falls back to a fresh status check so
    /// an already-migrated database reports complete.
    pub fn is_migration_complete(&self) -> bool {
        self.completion.is_set() || self.status_reporter().status().all_complete
    }

    /// Summary of pending, applied and failed scripts for the tenant.
    pub fn migration_status(&self) -> MigrationStatus {
        self.status_reporter().status()
    }

    /// Apply every pending script in name order.
    ///
    /// Returns `Ok` with [`RunOutcome::HaltedOnFailure`] when a script fails;
    /// `Err` only for fatal errors. The completion flag is set only on
    /// [`RunOutcome::Success`].
    pub fn apply_pending(&self) -> LedgerResult<ApplyReport> {
        let started = Instant::now();
        let mut phase = RunPhase::Idle;

        let result = self.run(&mut phase, started);
        match &result {
            Ok(report) => self.completion.set(report.is_success()),
            Err(e) => {
                transition(&mut phase, RunPhase::FatalError);
                log::error!("Migration run aborted: {e}");
                self.completion.set(false);
            }
        }
        result
    }

    fn run(&self, phase: &mut RunPhase, started: Instant) -> LedgerResult<ApplyReport> {
        transition(phase, RunPhase::Discovering);
        let tenant = self
            .settings
            .tenant
            .as_ref()
            .ok_or(CoreError::TenantMissing)?;
        let discovery = discover_scripts(&self.settings.migrations_dir)?;
        let _lock = RunLock::acquire(self.settings.lock, self.db.path(), tenant.as_str())?;
        let session = self.db.session()?;
        log::debug!(
            "Using {} database {}",
            self.db.db_type(),
            self.db
                .path()
                .map_or_else(|| "(in memory)".to_string(), |p| p.display().to_string())
        );
        self.store.ensure_table(session.conn())?;
        let successful = self.store.successful_names(session.conn(), tenant)?;
        let recorded = self.store.latest_success_checksums(session.conn(), tenant)?;

        transition(phase, RunPhase::ComputingPending);
        let pending: Vec<&MigrationScript> = discovery
            .scripts
            .iter()
            .filter(|s| !successful.contains(s.name.as_str()))
            .collect();
        let drifted = scan_drift(&discovery.scripts, &recorded);
        log::info!(
            "Tenant '{}': {} pending of {} discovered migration(s)",
            tenant,
            pending.len(),
            discovery.scripts.len()
        );

        let mut report = ApplyReport {
            tenant: tenant.to_string(),
            applied: Vec::new(),
            failed: None,
            drifted,
            outcome: RunOutcome::Success,
            elapsed_ms: 0.0,
        };

        for (index, script) in pending.into_iter().enumerate() {
            transition(phase, RunPhase::Applying(index));
            let (sql, checksum) = read_script(script)?;

            let script_started = Instant::now();
            match self.apply_script(&session, tenant.as_str(), script, &sql, &checksum, script_started) {
                Ok(()) => {
                    log::info!(
                        "Applied {} ({:.1} ms)",
                        script.name,
                        elapsed_ms(script_started)
                    );
                    report.applied.push(script.name.to_string());
                }
                Err(e) => {
                    let execution_time_ms = elapsed_ms(script_started);
                    let message = truncate_chars(&e.to_string(), self.settings.error_message_limit);
                    log::error!("Migration {} failed: {e}", script.name);

                    self.record_failure_best_effort(
                        &session,
                        &NewAttempt::failure(
                            script.name.as_str(),
                            tenant.as_str(),
                            &checksum,
                            execution_time_ms,
                            message.clone(),
                        ),
                    );

                    transition(phase, RunPhase::HaltedOnFailure);
                    report.failed = Some(FailedScript {
                        name: script.name.to_string(),
                        error: message,
                        execution_time_ms,
                    });
                    report.outcome = RunOutcome::HaltedOnFailure;
                    report.elapsed_ms = elapsed_ms(started);
                    return Ok(report);
                }
            }
        }

        transition(phase, RunPhase::Success);
        report.elapsed_ms = elapsed_ms(started);
        log::info!(
            "Migration run complete: {} applied in {:.1} ms",
            report.applied.len(),
            report.elapsed_ms
        );
        Ok(report)
    }

    /// Run every statement of one script and its `success` row in a single
    /// transaction.
    fn apply_script(
        &self,
        session: &Session<'_>,
        tenant: &str,
        script: &MigrationScript,
        sql: &str,
        checksum: &str,
        started: Instant,
    ) -> LedgerResult<()> {
        let statements = split_statements(sql);
        session.transaction(|conn| {
            for (i, statement) in statements.iter().enumerate() {
                let statement_started = Instant::now();
                conn.execute_batch(statement)
                    .map_err(|e| LedgerError::StatementFailed {
                        name: script.name.to_string(),
                        index: i + 1,
                        message: e.to_string(),
                    })?;
                log::debug!(
                    "{} statement {}/{} ({:.1} ms)",
                    script.name,
                    i + 1,
                    statements.len(),
                    elapsed_ms(statement_started)
                );
            }
            self.store.record_attempt(
                conn,
                &NewAttempt::success(script.name.as_str(), tenant, checksum, elapsed_ms(started)),
            )
        })
    }

    /// Append an `error` row in its own transaction. A failure here is logged
    /// and otherwise ignored so the original script error is what surfaces.
    fn record_failure_best_effort(&self, session: &Session<'_>, attempt: &NewAttempt) {
        let result: LedgerResult<()> =
            session.transaction(|conn| self.store.record_attempt(conn, attempt));
        if let Err(e) = result {
            log::error!(
                "Could not record failure of {} in {}: {e}",
                attempt.name,
                self.store.qualified_name()
            );
        }
    }
}

fn transition(phase: &mut RunPhase, next: RunPhase) {
    log::info!("Migration run: {} -> {}", phase, next);
    *phase = next;
}

/// Read a script and checksum its exact bytes.
fn read_script(script: &MigrationScript) -> LedgerResult<(String, String)> {
    let content = script
        .read_content()
        .map_err(|source| LedgerError::ScriptRead {
            name: script.name.to_string(),
            source,
        })?;
    let checksum = compute_checksum(&content);
    let sql = String::from_utf8(content).map_err(|_| LedgerError::ScriptEncoding {
        name: script.name.to_string(),
    })?;
    Ok((sql, checksum))
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Keep at most `limit` characters of `message`.
pub(crate) fn truncate_chars(message: &str, limit: usize) -> String {
    match message.char_indices().nth(limit) {
        Some((byte_index, _)) => message[..byte_index].to_string(),
        None => message.to_string(),
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
