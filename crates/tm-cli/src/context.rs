//! Runtime context for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tm_core::{Config, TenantId, MEMORY_DB_PATH};
use tm_db::DuckDbBackend;
use tm_ledger::{LedgerStore, MigrationEngine, MigrationSettings, StatusReporter};

use crate::cli::GlobalArgs;

/// Loaded configuration with command-line overrides applied
pub struct RuntimeContext {
    /// Project directory that relative paths resolve against
    pub root: PathBuf,

    /// Effective configuration
    pub config: Config,
}

impl RuntimeContext {
    /// Load `tidemark.yml` (or `--config`) and apply `--tenant` / `--database`.
    pub fn new(args: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&args.project_dir);

        let mut config = if let Some(config_path) = &args.config {
            Config::load(Path::new(config_path)).context("Failed to load configuration file")?
        } else {
            Config::load_from_dir(&root).context("Failed to load project configuration")?
        };

        config = config.with_tenant_override(args.tenant.as_deref());
        if let Some(database) = &args.database {
            config.database.path = database.clone();
        }
        config.validate().context("Invalid configuration")?;

        log::debug!(
            "Project {} (tenant: {}, database: {}, lock: {})",
            root.display(),
            config.tenant.as_ref().map_or("<unset>", TenantId::as_str),
            config.database.path,
            config.lock
        );

        Ok(Self { root, config })
    }

    /// Absolute migrations directory
    pub fn migrations_dir(&self) -> PathBuf {
        self.config.migrations_path_absolute(&self.root)
    }

    /// Tenant to operate on; fails when neither the file nor an override sets one.
    pub fn tenant(&self) -> Result<&TenantId> {
        self.config
            .require_tenant()
            .context("No tenant configured: set `tenant:` in tidemark.yml, --tenant or TIDEMARK_TENANT")
    }

    pub fn settings(&self) -> Result<MigrationSettings> {
        MigrationSettings::from_config(&self.config, &self.root).context("Invalid configuration")
    }

    pub fn store(&self) -> LedgerStore {
        LedgerStore::new(&self.config.ledger)
    }

    /// Open the configured database, creating the file if needed.
    pub fn open_database(&self) -> Result<Arc<DuckDbBackend>> {
        let path = self.config.database_path_absolute(&self.root);
        let db = DuckDbBackend::new(&path)
            .with_context(|| format!("Failed to connect to database {path}"))?;
        Ok(Arc::new(db))
    }

    /// Open the configured database for a read-only command.
    ///
    /// A database file that does not exist yet has nothing applied, so an
    /// empty in-memory database stands in for it and no file is created.
    pub fn open_existing_database(&self) -> Result<Arc<DuckDbBackend>> {
        let path = self.config.database_path_absolute(&self.root);
        if path != MEMORY_DB_PATH && !Path::new(&path).exists() {
            log::debug!("Database {path} does not exist yet; nothing applied");
            let db = DuckDbBackend::in_memory().context("Failed to open in-memory database")?;
            return Ok(Arc::new(db));
        }
        self.open_database()
    }

    pub fn engine(&self) -> Result<MigrationEngine<DuckDbBackend>> {
        let settings = self.settings()?;
        Ok(MigrationEngine::new(self.open_database()?, settings))
    }

    pub fn status_reporter(&self) -> Result<StatusReporter<DuckDbBackend>> {
        let settings = self.settings()?;
        Ok(StatusReporter::new(self.open_existing_database()?, settings))
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
