//! Resolved inputs for one migration engine.

use std::path::{Path, PathBuf};
use tm_core::{Config, CoreResult, LedgerConfig, LockMode, TenantId};

/// Everything the engine needs from `tidemark.yml`, with paths made absolute.
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// Tenant whose history is read and written. `None` fails every apply run.
    pub tenant: Option<TenantId>,
    pub migrations_dir: PathBuf,
    pub ledger: LedgerConfig,
    pub lock: LockMode,
    /// Maximum characters of an error message stored in the ledger
    pub error_message_limit: usize,
}

impl MigrationSettings {
    /// Resolve settings from a validated config rooted at `root`.
    pub fn from_config(config: &Config, root: &Path) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            tenant: config.tenant.clone(),
            migrations_dir: config.migrations_path_absolute(root),
            ledger: config.ledger.clone(),
            lock: config.lock,
            error_message_limit: config.error_message_limit,
        })
    }

    /// Settings with default ledger location and no run lock.
    pub fn new(tenant: &str, migrations_dir: impl Into<PathBuf>) -> Self {
        let defaults = Config::default();
        Self {
            tenant: TenantId::try_new(tenant),
            migrations_dir: migrations_dir.into(),
            ledger: defaults.ledger,
            lock: LockMode::None,
            error_message_limit: defaults.error_message_limit,
        }
    }
}
