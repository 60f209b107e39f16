//! Review Consensus Core
//!
//! Deterministic verdicts for multi-reviewer code review.
//!
//! Two independent paths run through this crate:
//!
//! - **Briefing path**: unified diff text → [`diff::parse`] → [`diff::tag`] →
//!   [`diff::DiffManifest`], rendered per reviewer domain.
//! - **Decision path**: reviewer findings → [`findings::FindingDeduplicator`]
//!   → [`scoring::ConsensusScorer`] → [`gate::evaluate_gate`], with human
//!   overrides recorded in the append-only [`ledger::BypassLedger`].
//!
//! Everything except the ledger is a pure, synchronous transformation with no
//! shared state, so independent reviews can run concurrently.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod diff;
pub mod error;
pub mod findings;
pub mod gate;
pub mod ledger;
pub mod scoring;
pub mod timing;
pub mod types;

pub use error::{Result, ReviewError};
pub use types::{Domain, Tier};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
