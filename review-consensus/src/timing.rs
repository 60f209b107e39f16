//! Timing instrumentation for the review pipeline
//!
//! The pipeline is synchronous and short-lived, so instrumentation is a
//! single macro that wraps a block and logs its duration via `tracing`.
//! Nothing is recorded unless the host installs a subscriber.
//!
//! ```rust
//! use codex_review_consensus::measure_time;
//!
//! let total = measure_time!("sum_findings", {
//!     (1..=10).sum::<u32>()
//! });
//! assert_eq!(total, 55);
//! ```

use std::time::Instant;

/// Measure execution time of a synchronous block
///
/// Logs timing information via `tracing::debug!` with fields:
/// - `operation`: The operation label
/// - `elapsed_ms`: Elapsed time in milliseconds (u128)
///
/// Returns the result of the block expression.
#[macro_export]
macro_rules! measure_time {
    ($label:expr, $block:expr) => {{
        let _start = ::std::time::Instant::now();
        let _result = $block;
        let _elapsed = _start.elapsed();
        ::tracing::debug!(
            operation = $label,
            elapsed_ms = _elapsed.as_millis(),
            "operation completed"
        );
        _result
    }};
}

/// Guard that logs elapsed time when dropped.
///
/// Useful when a function has several early returns and wrapping the body
/// in [`measure_time!`] would be awkward.
pub struct TimingGuard {
    operation: &'static str,
    start: Instant,
}

impl TimingGuard {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        tracing::debug!(
            operation = self.operation,
            elapsed_ms = self.start.elapsed().as_millis(),
            "operation completed"
        );
    }
}
