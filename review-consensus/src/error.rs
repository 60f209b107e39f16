//! Error types for review-consensus operations
//!
//! Most of the pipeline degrades instead of failing: malformed diff lines
//! are skipped, malformed findings are dropped, and a corrupt ledger is
//! quarantined. The variants here cover the few boundaries that do reject
//! input: bypass creation and configuration loading.

use thiserror::Error;

use crate::config::ConfigError;
use crate::findings::FindingError;
use crate::ledger::BypassError;

/// Review-consensus result type alias
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Crate-level error taxonomy
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Bypass(#[from] BypassError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Finding(#[from] FindingError),
}

impl ReviewError {
    /// Whether the caller supplied bad input (as opposed to an I/O failure)
    pub fn is_invalid_input(&self) -> bool {
        match self {
            ReviewError::Bypass(err) => err.is_validation(),
            ReviewError::Config(ConfigError::FileNotFound(_)) => false,
            ReviewError::Config(_) => true,
            ReviewError::Finding(_) => true,
        }
    }
}
