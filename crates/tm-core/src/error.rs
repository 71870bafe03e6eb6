//! Error types for tm-core

use thiserror::Error;

/// Core error type for Tidemark
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: No tenant identifier configured
    #[error("[E004] Tenant identifier is not configured. Set `tenant` in tidemark.yml, pass --tenant, or export TIDEMARK_TENANT")]
    TenantMissing,

    /// E005: Migrations directory missing
    #[error("[E005] Migrations directory not found: {path}")]
    MigrationsDirNotFound { path: String },

    /// E006: Script name does not follow the `NNN-description.sql` convention
    #[error("[E006] Invalid migration script name '{name}': expected NNN-description.sql")]
    InvalidScriptName { name: String },

    /// E007: IO error
    #[error("[E007] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E008: IO error with file path context
    #[error("[E008] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E009: YAML parse error
    #[error("[E009] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
