//! Process-wide "migrations are done" signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag recording whether the last apply run finished with nothing
/// left to apply.
///
/// Starts `false`. Only [`MigrationEngine`](crate::MigrationEngine) writes it;
/// clones observe the same value, so a health endpoint can hold one while the
/// engine runs on another thread.
#[derive(Debug, Clone, Default)]
pub struct CompletionFlag(Arc<AtomicBool>);

impl CompletionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, complete: bool) {
        self.0.store(complete, Ordering::Release);
    }
}
