//! Single-writer lock for apply runs.
//!
//! The lock file next to the database is persistent. Ownership is an
//! exclusive OS advisory lock on it, which the kernel drops together with
//! the holding process, so a killed run never leaves the database locked.

use crate::error::{LedgerError, LedgerResult};
use fs4::fs_std::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tm_core::LockMode;

/// Suffix appended to the database file name to form the lock path.
pub const LOCK_SUFFIX: &str = ".tidemark.lock";

/// A held run lock, released when this value is dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    // Closing the handle releases the advisory lock.
    _file: File,
}

impl RunLock {
    /// Lock file path for a database file.
    pub fn lock_path(db_path: &Path) -> PathBuf {
        let mut name = OsString::from(db_path.as_os_str());
        name.push(LOCK_SUFFIX);
        PathBuf::from(name)
    }

    /// Acquire the run lock for `db_path` without blocking.
    ///
    /// Returns `Ok(None)` when locking is disabled or the database has no
    /// file (in-memory), since no other process can reach it. A lock file
    /// left behind by a dead process is reused.
    pub fn acquire(mode: LockMode, db_path: Option<&Path>, tenant: &str) -> LedgerResult<Option<Self>> {
        if mode == LockMode::None {
            return Ok(None);
        }
        let Some(db_path) = db_path else {
            log::debug!("In-memory database, skipping run lock");
            return Ok(None);
        };

        let path = Self::lock_path(db_path);
        let io_err = |source: std::io::Error| LedgerError::LockIo {
            path: path.display().to_string(),
            source,
        };

        // No truncate here: the current holder's details must survive until
        // the lock is ours.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() != ErrorKind::WouldBlock {
                return Err(io_err(e));
            }
            let mut holder = String::new();
            let holder = match file.read_to_string(&mut holder) {
                Ok(_) if !holder.trim().is_empty() => holder.trim().replace('\n', ", "),
                _ => "unknown holder".to_string(),
            };
            return Err(LedgerError::LockHeld {
                path: path.display().to_string(),
                holder,
            });
        }

        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        writeln!(file, "pid={}\ntenant={}", std::process::id(), tenant).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        log::debug!("Acquired run lock {}", path.display());
        Ok(Some(Self { path, _file: file }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        log::debug!("Released run lock {}", self.path.display());
    }
}
