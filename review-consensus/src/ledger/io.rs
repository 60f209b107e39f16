//! Atomic read/write for the ledger file.
//!
//! Writes use the temp-file + fsync + rename pattern, so a reader sees
//! either the previous file or the complete new one.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::BypassError;
use super::record::BypassRecord;

/// Outcome of reading a ledger file that exists (or doesn't).
#[derive(Debug)]
pub(crate) enum LedgerContents {
    /// Missing, empty, or well-formed file.
    Records(Vec<BypassRecord>),
    /// File exists but does not hold a JSON array of records.
    Corrupt(serde_json::Error),
}

fn io_error(path: &Path, source: io::Error) -> BypassError {
    BypassError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read the ledger at `path`.
///
/// Only I/O failures are errors; malformed content is reported as
/// [`LedgerContents::Corrupt`] so the caller can quarantine it.
pub(crate) fn read_ledger(path: &Path) -> Result<LedgerContents, BypassError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(LedgerContents::Records(Vec::new()));
        }
        Err(err) => return Err(io_error(path, err)),
    };

    if content.trim().is_empty() {
        return Ok(LedgerContents::Records(Vec::new()));
    }

    Ok(match serde_json::from_str::<Vec<BypassRecord>>(&content) {
        Ok(records) => LedgerContents::Records(records),
        Err(err) => LedgerContents::Corrupt(err),
    })
}

/// Replace the ledger at `path` with `records`.
///
/// 1. Write to a uniquely named temp file in the same directory
/// 2. fsync the temp file
/// 3. Rename over the target
pub(crate) fn write_ledger(path: &Path, records: &[BypassRecord]) -> Result<(), BypassError> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

    let json = serde_json::to_string_pretty(records)?;
    let temp_path = temp_path_for(path);

    let written = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()
    })();
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error(&temp_path, err));
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error(path, err));
    }
    Ok(())
}

/// Move a corrupt ledger aside to `<name>.corrupt.<timestamp>.<id>`.
///
/// The random id keeps two quarantines in the same millisecond from
/// replacing each other.
pub(crate) fn quarantine(path: &Path, now: DateTime<Utc>) -> Result<PathBuf, BypassError> {
    let suffix = format!(
        ".corrupt.{}.{}",
        now.format("%Y%m%dT%H%M%S%.3fZ"),
        Uuid::new_v4().simple()
    );
    let target = sibling_with_suffix(path, "", &suffix);
    fs::rename(path, &target).map_err(|e| io_error(path, e))?;
    Ok(target)
}

/// Exclusive advisory lock on a sidecar `.lock` file, released on drop.
pub(crate) struct LedgerLock {
    file: File,
}

impl LedgerLock {
    pub(crate) fn acquire(ledger_path: &Path) -> Result<Self, BypassError> {
        let dir = parent_dir(ledger_path);
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;

        let lock_path = lock_path_for(ledger_path);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| io_error(&lock_path, e))?;

        // Blocks while another writer holds the lock
        file.lock_exclusive().map_err(|e| io_error(&lock_path, e))?;
        Ok(Self { file })
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn sibling_with_suffix(path: &Path, prefix: &str, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    parent_dir(path).join(format!("{prefix}{file_name}{suffix}"))
}

fn temp_path_for(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".", &format!(".{}.tmp", Uuid::new_v4().simple()))
}

pub(crate) fn lock_path_for(path: &Path) -> PathBuf {
    sibling_with_suffix(path, "", ".lock")
}
