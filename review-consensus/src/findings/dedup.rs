//! Merge near-duplicate findings reported by several reviewers.
//!
//! Findings on the same file and category whose line ranges overlap, or sit
//! within `line_tolerance` lines of each other, describe one logical issue.
//! Groups are built by a sweep over a canonically sorted list, so the result
//! does not depend on the order reviewers reported in.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use tracing::{debug, warn};

use super::raw::{RawFinding, clamp_score};

/// Default maximum gap, in lines, between ranges that still merge.
pub const DEFAULT_LINE_TOLERANCE: usize = 3;

/// Hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 16;

/// Deduplication settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Ranges separated by at most this many lines are merged.
    pub line_tolerance: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            line_tolerance: DEFAULT_LINE_TOLERANCE,
        }
    }
}

/// One logical issue, merged from every finding that reported it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeduplicatedFinding {
    /// Stable key over file, category and merged line range.
    pub fingerprint: String,
    pub file: String,
    pub line_start: usize,
    pub line_end: usize,
    pub category: String,
    /// Maximum severity observed in the group.
    pub severity: f64,
    /// Maximum confidence observed in the group.
    pub confidence: f64,
    /// One entry per contributing finding; the first is representative.
    pub descriptions: Vec<String>,
    /// Union of remediation steps, first-seen order.
    pub remediation: Vec<String>,
    /// Distinct contributing reviewers, first-seen order.
    pub reviewer_ids: Vec<String>,
    /// Number of distinct reviewers.
    pub k: usize,
}

impl DeduplicatedFinding {
    /// Representative description (empty when none was given).
    pub fn description(&self) -> &str {
        self.descriptions.first().map(String::as_str).unwrap_or_default()
    }
}

/// Groups raw findings into [`DeduplicatedFinding`]s.
#[derive(Clone, Debug, Default)]
pub struct FindingDeduplicator {
    config: DedupConfig,
}

impl FindingDeduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Merge `findings` into deduplicated findings.
    ///
    /// Malformed findings are dropped with a warning. Output is ordered by
    /// file, category and line range, and is identical for any permutation
    /// of the input.
    pub fn deduplicate(&self, findings: &[RawFinding]) -> Vec<DeduplicatedFinding> {
        crate::measure_time!("deduplicate_findings", {
            let mut accepted: Vec<RawFinding> = findings
                .iter()
                .filter_map(|finding| {
                    let normalized = normalize(finding);
                    match normalized.validate() {
                        Ok(()) => Some(normalized),
                        Err(err) => {
                            warn!(reviewer_id = %finding.reviewer_id, "dropping malformed finding: {err}");
                            None
                        }
                    }
                })
                .collect();
            accepted.sort_by(canonical_order);

            let mut merged = Vec::new();
            let mut group: Vec<RawFinding> = Vec::new();
            let mut group_end = 0usize;

            for finding in accepted {
                let joins = group.first().is_some_and(|head| {
                    head.file == finding.file
                        && head.category == finding.category
                        && finding.line_start <= group_end.saturating_add(self.config.line_tolerance)
                });
                if !joins {
                    merged.extend(merge_group(&group));
                    group.clear();
                }
                if group.is_empty() {
                    group_end = finding.line_end;
                } else {
                    group_end = group_end.max(finding.line_end);
                }
                group.push(finding);
            }
            merged.extend(merge_group(&group));

            debug!(
                input = findings.len(),
                output = merged.len(),
                line_tolerance = self.config.line_tolerance,
                "deduplicated findings"
            );
            merged
        })
    }
}

/// Canonical spelling of the fields that participate in grouping.
fn normalize(finding: &RawFinding) -> RawFinding {
    let file = finding.file.trim().replace('\\', "/");
    let mut file = file.as_str();
    while let Some(rest) = file.strip_prefix("./") {
        file = rest;
    }

    RawFinding {
        file: file.to_string(),
        line_start: finding.line_start.min(finding.line_end),
        line_end: finding.line_start.max(finding.line_end),
        category: finding.category.trim().to_lowercase(),
        severity: clamp_score(finding.severity),
        confidence: clamp_score(finding.confidence),
        description: finding.description.trim().to_string(),
        reviewer_id: finding.reviewer_id.trim().to_string(),
        ..finding.clone()
    }
}

fn canonical_order(a: &RawFinding, b: &RawFinding) -> Ordering {
    a.file
        .cmp(&b.file)
        .then_with(|| a.category.cmp(&b.category))
        .then_with(|| a.line_start.cmp(&b.line_start))
        .then_with(|| a.line_end.cmp(&b.line_end))
        .then_with(|| a.reviewer_id.cmp(&b.reviewer_id))
        .then_with(|| a.description.cmp(&b.description))
        .then_with(|| b.severity.total_cmp(&a.severity))
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| a.remediation.cmp(&b.remediation))
}

fn merge_group(group: &[RawFinding]) -> Option<DeduplicatedFinding> {
    let head = group.first()?;
    let mut line_start = head.line_start;
    let mut line_end = head.line_end;
    let mut severity = head.severity;
    let mut confidence = head.confidence;
    let mut descriptions = Vec::with_capacity(group.len());
    let mut remediation: Vec<String> = Vec::new();
    let mut reviewer_ids: Vec<String> = Vec::new();

    for finding in group {
        line_start = line_start.min(finding.line_start);
        line_end = line_end.max(finding.line_end);
        severity = severity.max(finding.severity);
        confidence = confidence.max(finding.confidence);
        descriptions.push(finding.description.clone());
        for step in &finding.remediation {
            if !remediation.contains(step) {
                remediation.push(step.clone());
            }
        }
        if !reviewer_ids.contains(&finding.reviewer_id) {
            reviewer_ids.push(finding.reviewer_id.clone());
        }
    }

    Some(DeduplicatedFinding {
        fingerprint: fingerprint(&head.file, &head.category, line_start, line_end),
        file: head.file.clone(),
        line_start,
        line_end,
        category: head.category.clone(),
        severity,
        confidence,
        descriptions,
        remediation,
        k: reviewer_ids.len(),
        reviewer_ids,
    })
}

/// First 16 hex characters of SHA-256 over the grouping key.
pub fn fingerprint(file: &str, category: &str, line_start: usize, line_end: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file.as_bytes());
    hasher.update([0]);
    hasher.update(category.as_bytes());
    hasher.update([0]);
    hasher.update(format!("{line_start}-{line_end}").as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..FINGERPRINT_LEN].to_string()
}
