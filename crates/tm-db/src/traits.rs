//! Database trait definition

use crate::error::DbResult;
use crate::session::Session;
use std::path::Path;

/// Session provider consumed by the migration engine.
///
/// Implementations must be Send + Sync so one provider can be shared between
/// an apply run and readiness checks; the sessions they hand out are
/// exclusive.
pub trait Database: Send + Sync {
    /// Acquire an exclusive session. Released when the returned value drops.
    fn session(&self) -> DbResult<Session<'_>>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;

    /// On-disk location of the database, `None` when it lives in memory.
    fn path(&self) -> Option<&Path>;
}
