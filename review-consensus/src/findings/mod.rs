//! Decision path input: reviewer findings
//!
//! Reviewer output is validated once at the boundary ([`raw`]) and then
//! merged across reviewers ([`dedup`]) before scoring.

pub mod dedup;
pub mod raw;

pub use dedup::{DEFAULT_LINE_TOLERANCE, DedupConfig, DeduplicatedFinding, FindingDeduplicator, fingerprint};
pub use raw::{FindingError, RawFinding, RawFindingInput, parse_reviewer_output};
