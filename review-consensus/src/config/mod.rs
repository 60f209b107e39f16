/// Configuration module for the review pipeline
///
/// Implements layered configuration with the 12-factor app pattern:
/// 1. Defaults (from code)
/// 2. Config file (review.toml)
/// 3. Environment variables (REVIEW_* prefix)
///
/// # Example
///
/// ```no_run
/// use codex_review_consensus::config::ConfigLoader;
/// use codex_review_consensus::ledger::BypassLedger;
///
/// let config = ConfigLoader::load_default()?;
/// let ledger = BypassLedger::from_config(&config.ledger);
/// # Ok::<(), codex_review_consensus::config::ConfigError>(())
/// ```
pub mod error;
pub mod loader;
pub mod validator;

pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, ENV_PREFIX, LedgerConfig, ReviewConfig};
pub use validator::SchemaValidator;
