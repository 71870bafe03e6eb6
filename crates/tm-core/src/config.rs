//! Configuration types and parsing for tidemark.yml

use crate::error::{CoreError, CoreResult};
use crate::tenant::TenantId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default directory, relative to the project root, holding migration scripts.
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Special database path for a throwaway in-memory database.
pub const MEMORY_DB_PATH: &str = ":memory:";

/// Main project configuration from tidemark.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Tenant whose migration history this project manages
    #[serde(default)]
    pub tenant: Option<TenantId>,

    /// Directory containing `NNN-description.sql` scripts
    #[serde(default = "default_migrations_path")]
    pub migrations_path: String,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Location of the migration ledger table
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Single-writer protection for apply runs
    #[serde(default)]
    pub lock: LockMode,

    /// Maximum number of characters of an error message stored in the ledger
    #[serde(default = "default_error_message_limit")]
    pub error_message_limit: usize,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database path (DuckDB file, or `:memory:`)
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Where the append-only migration ledger lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Schema holding the ledger table
    #[serde(default = "default_ledger_schema")]
    pub schema: String,

    /// Ledger table name
    #[serde(default = "default_ledger_table")]
    pub table: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            schema: default_ledger_schema(),
            table: default_ledger_table(),
        }
    }
}

impl LedgerConfig {
    /// Schema-qualified table name, e.g. `main.applied_migrations`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// How concurrent apply runs against the same database are prevented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Rely on a single migration runner per deployment
    None,
    /// Hold an advisory lock on a file next to the database for the duration of a run
    #[default]
    File,
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockMode::None => write!(f, "none"),
            LockMode::File => write!(f, "file"),
        }
    }
}

fn default_migrations_path() -> String {
    DEFAULT_MIGRATIONS_DIR.to_string()
}

fn default_db_path() -> String {
    "tidemark.duckdb".to_string()
}

fn default_ledger_schema() -> String {
    "main".to_string()
}

fn default_ledger_table() -> String {
    "applied_migrations".to_string()
}

fn default_error_message_limit() -> usize {
    1000
}

/// Ledger schema and table names are spliced into SQL, so they are restricted
/// to plain identifiers.
fn identifier_pattern() -> &'static Regex {
    static IDENT_RE: OnceLock<Regex> = OnceLock::new();
    IDENT_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant: None,
            migrations_path: default_migrations_path(),
            database: DatabaseConfig::default(),
            ledger: LedgerConfig::default(),
            lock: LockMode::default(),
            error_message_limit: default_error_message_limit(),
        }
    }
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                message: format!("{}: {}", path.display(), e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for tidemark.yml or tidemark.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("tidemark.yml");
        let yaml_path = dir.join("tidemark.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.migrations_path.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "migrations_path cannot be empty".to_string(),
            });
        }

        if self.database.path.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "database.path cannot be empty".to_string(),
            });
        }

        for (field, value) in [
            ("ledger.schema", &self.ledger.schema),
            ("ledger.table", &self.ledger.table),
        ] {
            if !identifier_pattern().is_match(value) {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "{} '{}' must be a plain SQL identifier (letters, digits, underscore)",
                        field, value
                    ),
                });
            }
        }

        if self.error_message_limit == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "error_message_limit must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Replace the configured tenant when an override is supplied.
    ///
    /// Blank overrides are ignored so an empty environment variable does not
    /// erase a tenant set in the file.
    pub fn with_tenant_override(mut self, tenant: Option<&str>) -> Self {
        if let Some(tenant) = tenant.and_then(TenantId::try_new) {
            self.tenant = Some(tenant);
        }
        self
    }

    /// Return the configured tenant, failing when none is set.
    pub fn require_tenant(&self) -> CoreResult<&TenantId> {
        self.tenant.as_ref().ok_or(CoreError::TenantMissing)
    }

    /// Get the absolute migrations directory relative to a project root
    pub fn migrations_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.migrations_path)
    }

    /// Resolve the database path against a project root.
    ///
    /// `:memory:` is returned unchanged.
    pub fn database_path_absolute(&self, root: &Path) -> String {
        if self.database.path == MEMORY_DB_PATH {
            return MEMORY_DB_PATH.to_string();
        }
        root.join(&self.database.path).display().to_string()
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
