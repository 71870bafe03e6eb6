//! tm-core - Core library for Tidemark
//!
//! This crate provides the pieces of the migration engine that never touch a
//! database: configuration parsing, migration script discovery, the SQL
//! statement splitter, and content checksums.

pub mod checksum;
pub mod config;
pub mod error;
pub mod script;
pub mod sql_split;
pub mod tenant;

pub use checksum::{checksum_file, compute_checksum};
pub use config::{Config, LedgerConfig, LockMode, MEMORY_DB_PATH};
pub use error::{CoreError, CoreResult};
pub use script::{discover_scripts, Discovery, MigrationScript, ScriptName};
pub use sql_split::split_statements;
pub use tenant::TenantId;
