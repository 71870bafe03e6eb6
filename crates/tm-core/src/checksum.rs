//! SHA-256 checksums for migration script provenance.

use crate::error::{CoreError, CoreResult};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Compute the lowercase hex SHA-256 digest of raw bytes.
pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    format!("{:x}", result)
}

/// Read a file and return the checksum of its exact bytes.
pub fn checksum_file(path: &Path) -> CoreResult<String> {
    let bytes = std::fs::read(path).map_err(|e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(compute_checksum(&bytes))
}
