//! Emergency bypass ledger
//!
//! An append-only JSON array of [`BypassRecord`]s on disk. Every append
//! rewrites the file atomically; a file that cannot be parsed is
//! quarantined and the ledger starts fresh, since an unreadable audit file
//! must not take the review pipeline down with it.
//!
//! Two processes appending at the same time can lose one record. Callers
//! that need linearizable appends enable [`BypassLedger::with_advisory_lock`].

mod io;
pub mod record;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

use crate::config::LedgerConfig;
use crate::scoring::ConsensusScoreResult;
use crate::timing::TimingGuard;
use io::{LedgerContents, LedgerLock};

pub use record::{BYPASS_TTL_HOURS, BypassRecord};

/// Errors raised when recording a bypass.
#[derive(Debug, Error)]
pub enum BypassError {
    #[error("bypass reason must not be empty")]
    EmptyReason,

    #[error("bypass task id must not be empty")]
    EmptyTaskId,

    #[error("ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BypassError {
    /// Whether the request itself was invalid (as opposed to a storage failure)
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyReason | Self::EmptyTaskId)
    }
}

/// Handle on one ledger file.
///
/// The handle holds no records in memory; every call reads the file, so
/// several handles on the same path see each other's appends.
#[derive(Clone, Debug)]
pub struct BypassLedger {
    path: PathBuf,
    advisory_lock: bool,
}

impl BypassLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            advisory_lock: false,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self {
            path: config.path(),
            advisory_lock: config.advisory_lock,
        }
    }

    /// Serialize appends through an exclusive lock on `<ledger>.lock`.
    pub fn with_advisory_lock(mut self) -> Self {
        self.advisory_lock = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a bypass of `result` for `task_id`, created now.
    pub fn create(
        &self,
        task_id: &str,
        reason: &str,
        bypassed_by: &str,
        result: &ConsensusScoreResult,
    ) -> Result<BypassRecord, BypassError> {
        self.create_at(task_id, reason, bypassed_by, result, Utc::now())
    }

    /// Record a bypass created at `now`.
    ///
    /// Fails with [`BypassError::EmptyReason`] for a blank reason. Read
    /// failures abort the append so existing history is never overwritten.
    /// A corrupt file is quarantined first; if it cannot be moved aside the
    /// append fails instead of writing over it.
    pub fn create_at(
        &self,
        task_id: &str,
        reason: &str,
        bypassed_by: &str,
        result: &ConsensusScoreResult,
        now: DateTime<Utc>,
    ) -> Result<BypassRecord, BypassError> {
        let record = BypassRecord::new_at(task_id, reason, bypassed_by, result, now)?;

        let _timer = TimingGuard::new("bypass_create");
        let _lock = if self.advisory_lock {
            Some(LedgerLock::acquire(&self.path)?)
        } else {
            None
        };

        let mut records = match io::read_ledger(&self.path)? {
            LedgerContents::Records(records) => records,
            LedgerContents::Corrupt(err) => {
                self.quarantine(&err, now)?;
                Vec::new()
            }
        };
        records.push(record.clone());
        io::write_ledger(&self.path, &records)?;

        info!(
            bypass_id = %record.bypass_id,
            task_id = %record.task_id,
            bypassed_by = %record.bypassed_by,
            cs = record.cs_at_bypass,
            tier = %record.tier_at_bypass,
            expires_at = %record.expires_at,
            ledger_size = records.len(),
            "emergency bypass recorded"
        );
        Ok(record)
    }

    /// All records in append order.
    ///
    /// Never fails: a corrupt file is quarantined and any read error is
    /// logged, both yielding an empty ledger.
    pub fn load(&self) -> Vec<BypassRecord> {
        match io::read_ledger(&self.path) {
            Ok(LedgerContents::Records(records)) => records,
            Ok(LedgerContents::Corrupt(err)) => {
                // Logged either way; load stays fail-open.
                let _ = self.quarantine(&err, Utc::now());
                Vec::new()
            }
            Err(err) => {
                error!(path = %self.path.display(), "failed to read bypass ledger: {err}");
                Vec::new()
            }
        }
    }

    /// Whether `task_id` has an unexpired bypass.
    pub fn is_bypassed(&self, task_id: &str) -> bool {
        self.active_bypass_for_at(task_id, Utc::now()).is_some()
    }

    /// Unexpired records in append order.
    pub fn active_bypasses(&self) -> Vec<BypassRecord> {
        self.active_bypasses_at(Utc::now())
    }

    pub fn active_bypasses_at(&self, now: DateTime<Utc>) -> Vec<BypassRecord> {
        self.load()
            .into_iter()
            .filter(|record| !record.is_expired_at(now))
            .collect()
    }

    /// Most recent unexpired bypass for `task_id`.
    pub fn active_bypass_for(&self, task_id: &str) -> Option<BypassRecord> {
        self.active_bypass_for_at(task_id, Utc::now())
    }

    pub fn active_bypass_for_at(&self, task_id: &str, now: DateTime<Utc>) -> Option<BypassRecord> {
        let task_id = task_id.trim();
        self.active_bypasses_at(now)
            .into_iter()
            .filter(|record| record.task_id == task_id)
            .max_by_key(|record| record.created_at)
    }

    fn quarantine(
        &self,
        cause: &serde_json::Error,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, BypassError> {
        match io::quarantine(&self.path, now) {
            Ok(moved_to) => {
                error!(
                    path = %self.path.display(),
                    quarantined = %moved_to.display(),
                    "bypass ledger is corrupt ({cause}); quarantined and starting fresh"
                );
                Ok(moved_to)
            }
            Err(err) => {
                error!(
                    path = %self.path.display(),
                    "bypass ledger is corrupt ({cause}) and could not be quarantined: {err}"
                );
                Err(err)
            }
        }
    }
}
