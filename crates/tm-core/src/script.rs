//! Migration script naming and discovery.
//!
//! A migration script is a `.sql` file named `NNN-description.sql`, where
//! `NNN` is a zero-padded three digit ordinal. Lexicographic order of the
//! names is the apply order.

use crate::error::{CoreError, CoreResult};
use regex::Regex;
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// File extension recognised as a migration script.
pub const SCRIPT_EXTENSION: &str = "sql";

fn script_name_pattern() -> &'static Regex {
    static SCRIPT_NAME_RE: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only; Unicode `\d` would admit names like `٠٠١-init.sql`.
    SCRIPT_NAME_RE.get_or_init(|| Regex::new(r"^([0-9]{3})-.+\.sql$").expect("valid regex"))
}

/// A validated `NNN-description.sql` file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ScriptName(String);

impl ScriptName {
    /// Validate a file name against the naming convention.
    pub fn parse(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if script_name_pattern().is_match(&name) {
            Ok(Self(name))
        } else {
            Err(CoreError::InvalidScriptName { name })
        }
    }

    /// Return `true` if `name` follows the naming convention.
    pub fn is_valid(name: &str) -> bool {
        script_name_pattern().is_match(name)
    }

    /// The three digit ordinal prefix.
    pub fn ordinal(&self) -> u16 {
        script_name_pattern()
            .captures(&self.0)
            .and_then(|caps| caps.get(1))
            .and_then(|digits| digits.as_str().parse().ok())
            .unwrap_or_default()
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ScriptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScriptName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ScriptName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ScriptName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for ScriptName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One discovered migration script.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationScript {
    /// Validated file name, unique within the migrations directory
    pub name: ScriptName,

    /// Full path to the script file
    pub path: PathBuf,
}

impl MigrationScript {
    /// Build a script from a path whose file name follows the convention.
    pub fn from_path(path: PathBuf) -> CoreResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CoreError::InvalidScriptName {
                name: path.display().to_string(),
            })?;
        let name = ScriptName::parse(file_name)?;
        Ok(Self { name, path })
    }

    /// Three digit ordinal of this script.
    pub fn ordinal(&self) -> u16 {
        self.name.ordinal()
    }

    /// Read the script's raw bytes. Never cached: every call hits the disk.
    pub fn read_content(&self) -> CoreResult<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| CoreError::IoWithPath {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}

/// Result of scanning a migrations directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Discovery {
    /// Qualifying scripts in apply order
    pub scripts: Vec<MigrationScript>,

    /// `.sql` files that do not follow the naming convention
    pub ignored: Vec<String>,
}

impl Discovery {
    /// Script names in apply order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scripts.iter().map(|s| s.name.as_str())
    }

    /// Look up a discovered script by name.
    pub fn get(&self, name: &str) -> Option<&MigrationScript> {
        self.scripts.iter().find(|s| s.name.as_str() == name)
    }

    /// Number of `.sql` files seen, qualifying or not.
    pub fn total_files(&self) -> usize {
        self.scripts.len() + self.ignored.len()
    }
}

/// Scan `dir` for migration scripts.
///
/// Only regular files directly inside `dir` with a `.sql` extension are
/// considered. Names that do not match `NNN-description.sql` are recorded in
/// [`Discovery::ignored`] and never fail the scan. A missing directory is an
/// error: there is nothing to migrate from.
pub fn discover_scripts(dir: &Path) -> CoreResult<Discovery> {
    if !dir.is_dir() {
        return Err(CoreError::MigrationsDirNotFound {
            path: dir.display().to_string(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source: e,
    })?;

    let mut discovery = Discovery::default();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || !path.extension().is_some_and(|e| e == SCRIPT_EXTENSION) {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match MigrationScript::from_path(path) {
            Ok(script) => discovery.scripts.push(script),
            Err(_) => {
                log::warn!("Ignoring '{}': expected NNN-description.sql", file_name);
                discovery.ignored.push(file_name);
            }
        }
    }

    discovery.scripts.sort_by(|a, b| a.name.cmp(&b.name));
    discovery.ignored.sort();
    warn_duplicate_ordinals(&discovery.scripts);

    log::info!(
        "Discovered {} migration script{} in {} ({} ignored)",
        discovery.scripts.len(),
        if discovery.scripts.len() == 1 { "" } else { "s" },
        dir.display(),
        discovery.ignored.len()
    );

    Ok(discovery)
}

/// Two scripts sharing an ordinal still apply in name order, but it usually
/// means two branches picked the same number.
fn warn_duplicate_ordinals(scripts: &[MigrationScript]) {
    let mut by_ordinal: HashMap<u16, Vec<&str>> = HashMap::new();
    for script in scripts {
        by_ordinal
            .entry(script.ordinal())
            .or_default()
            .push(script.name.as_str());
    }
    let mut duplicates: Vec<_> = by_ordinal
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .collect();
    duplicates.sort_by_key(|(ordinal, _)| *ordinal);
    for (ordinal, names) in duplicates {
        log::warn!(
            "Ordinal {:03} is shared by {}; they will apply in name order",
            ordinal,
            names.join(", ")
        );
    }
}

#[cfg(test)]
#[path = "script_test.rs"]
mod tests;
