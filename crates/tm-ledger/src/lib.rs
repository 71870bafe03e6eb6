//! Migration ledger for Tidemark.
//!
//! Owns the append-only `applied_migrations` history, the apply engine that
//! runs pending scripts one transaction at a time, and the read-only status
//! reporter used for readiness checks.

pub mod completion;
pub mod drift;
pub mod engine;
pub mod error;
pub mod lock;
pub mod settings;
pub mod status;
pub mod store;

pub use completion::CompletionFlag;
pub use drift::{detect_drift, scan_drift, Drift};
pub use engine::{ApplyReport, FailedScript, MigrationEngine, RunOutcome, RunPhase};
pub use error::{LedgerError, LedgerResult};
pub use lock::RunLock;
pub use settings::MigrationSettings;
pub use status::{MigrationStatus, StatusReporter};
pub use store::{AppliedMigration, AttemptStatus, LedgerStore, MigrationRecord, NewAttempt};
