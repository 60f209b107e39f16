//! Diff briefing path
//!
//! Turns `git diff` text into structured per-file changes, tags each file
//! with the review domains it is relevant to, and aggregates the result into
//! a [`DiffManifest`] that can be rendered per reviewer.
//!
//! Parsing is best-effort: malformed lines are skipped, never surfaced as
//! errors. A caller handing in garbage gets a smaller manifest, not a failure.

pub mod context;
pub mod manifest;
pub mod parser;
pub mod tagger;

pub use context::extract_signature;
pub use manifest::{DiffManifest, build_manifest};
pub use parser::{ChangeHunk, FileChange, FileChangeType, HunkChangeType, MAX_RAW_LINES, parse};
pub use tagger::tag;

/// Strip the one-character unified-diff prefix (`+`, `-`, or space) from a
/// buffered raw line.
pub(crate) fn strip_diff_prefix(line: &str) -> &str {
    match line.as_bytes().first() {
        Some(b'+') | Some(b'-') | Some(b' ') => &line[1..],
        _ => line,
    }
}

/// Truncate to `max_chars` characters, appending `...` when cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}
