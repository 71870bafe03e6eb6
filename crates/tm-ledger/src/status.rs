//! Read-only migration status for readiness checks.
//!
//! Never creates the ledger table: a database without one simply has nothing
//! applied yet.

use crate::completion::CompletionFlag;
use crate::drift::{scan_drift, Drift};
use crate::error::LedgerResult;
use crate::settings::MigrationSettings;
use crate::store::{AttemptStatus, LedgerStore};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tm_core::{discover_scripts, CoreError};
use tm_db::Database;

/// Snapshot of migration progress for one tenant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatus {
    pub tenant: String,
    /// Number of discovered scripts
    pub total: usize,
    /// Discovered scripts without a success row, in apply order
    pub pending: Vec<String>,
    /// Scripts with at least one success row
    pub successful: Vec<String>,
    /// Scripts whose latest attempt failed and that never succeeded
    pub failed: Vec<String>,
    pub drifted: Vec<Drift>,
    /// `.sql` files skipped for not following the naming convention
    pub ignored: Vec<String>,
    /// Nothing pending and nothing failed
    pub all_complete: bool,
    /// Value of the engine's completion flag
    pub migration_complete: bool,
    /// Set when the status could not be determined
    pub error: Option<String>,
}

impl MigrationStatus {
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn applied_count(&self) -> usize {
        self.successful.len()
    }

    pub fn failed_names(&self) -> &[String] {
        &self.failed
    }
}

/// Computes [`MigrationStatus`] without writing to the database.
pub struct StatusReporter<D: Database> {
    db: Arc<D>,
    settings: MigrationSettings,
    store: LedgerStore,
    completion: CompletionFlag,
}

impl<D: Database> StatusReporter<D> {
    pub fn new(db: Arc<D>, settings: MigrationSettings) -> Self {
        let store = LedgerStore::new(&settings.ledger);
        Self {
            db,
            settings,
            store,
            completion: CompletionFlag::new(),
        }
    }

    pub fn with_completion_flag(mut self, completion: CompletionFlag) -> Self {
        self.completion = completion;
        self
    }

    /// Compute the status, propagating any failure.
    pub fn try_status(&self) -> LedgerResult<MigrationStatus> {
        let tenant = self
            .settings
            .tenant
            .as_ref()
            .ok_or(CoreError::TenantMissing)?;
        let discovery = discover_scripts(&self.settings.migrations_dir)?;

        let (successful, latest, recorded) = {
            let session = self.db.session()?;
            let conn = session.conn();
            if self.store.exists(conn)? {
                (
                    self.store.successful_names(conn, tenant)?,
                    self.store.applied_for(conn, tenant)?,
                    self.store.latest_success_checksums(conn, tenant)?,
                )
            } else {
                log::debug!(
                    "Ledger {} does not exist yet; nothing applied",
                    self.store.qualified_name()
                );
                (BTreeSet::new(), Vec::new(), HashMap::new())
            }
        };

        let pending: Vec<String> = discovery
            .names()
            .filter(|name| !successful.contains(*name))
            .map(str::to_string)
            .collect();
        let failed: Vec<String> = latest
            .into_iter()
            .filter(|m| m.status == AttemptStatus::Error && !successful.contains(&m.name))
            .map(|m| m.name)
            .collect();
        let drifted = scan_drift(&discovery.scripts, &recorded);
        let all_complete = pending.is_empty() && failed.is_empty();

        Ok(MigrationStatus {
            tenant: tenant.to_string(),
            total: discovery.scripts.len(),
            pending,
            successful: successful.into_iter().collect(),
            failed,
            drifted,
            ignored: discovery.ignored,
            all_complete,
            migration_complete: self.completion.is_set(),
            error: None,
        })
    }

    /// Compute the status, reporting any failure as a not-ready status.
    pub fn status(&self) -> MigrationStatus {
        self.try_status().unwrap_or_else(|e| {
            log::warn!("Migration status unavailable: {e}");
            MigrationStatus {
                tenant: self
                    .settings
                    .tenant
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                migration_complete: self.completion.is_set(),
                error: Some(e.to_string()),
                ..MigrationStatus::default()
            }
        })
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
