//! Detection of applied scripts whose content changed afterwards.

use serde::Serialize;
use std::collections::HashMap;
use tm_core::{compute_checksum, MigrationScript};

/// A discovered script whose checksum differs from its latest success row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub name: String,
    pub recorded: String,
    pub current: String,
}

/// Compare current checksums against the latest successful ones.
///
/// `current` pairs script names with the checksum of their content now.
/// Scripts that were never applied are not drift. Drifted scripts are only
/// reported; they are never re-applied.
pub fn detect_drift<'a>(
    current: impl IntoIterator<Item = (&'a str, String)>,
    recorded: &HashMap<String, String>,
) -> Vec<Drift> {
    current
        .into_iter()
        .filter_map(|(name, checksum)| {
            let applied = recorded.get(name)?;
            (applied != &checksum).then(|| Drift {
                name: name.to_string(),
                recorded: applied.clone(),
                current: checksum,
            })
        })
        .collect()
}

/// Re-hash every script that has a recorded checksum and report drift.
///
/// Each drifted script is logged as a warning. An unreadable script is
/// skipped with a warning of its own.
pub fn scan_drift(scripts: &[MigrationScript], recorded: &HashMap<String, String>) -> Vec<Drift> {
    let current = scripts
        .iter()
        .filter(|s| recorded.contains_key(s.name.as_str()))
        .filter_map(|s| match s.read_content() {
            Ok(bytes) => Some((s.name.as_str(), compute_checksum(&bytes))),
            Err(e) => {
                log::warn!("Cannot re-check applied script '{}': {e}", s.name);
                None
            }
        });

    let drift = detect_drift(current, recorded);
    for d in &drift {
        log::warn!(
            "Applied script '{}' changed on disk (recorded {}, now {}); it will not be re-applied",
            d.name,
            short(&d.recorded),
            short(&d.current)
        );
    }
    drift
}

fn short(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}
