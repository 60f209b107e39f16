//! Consensus scoring over deduplicated findings
//!
//! ```text
//! R_i   = clamp(severity * confidence / 10, 0, 10) * weight_i
//! R_bar = mean(R_i)            over active findings (weight > 0)
//! R_max = max(R_i)
//! k_tot = sum(k_i)
//!
//! CS    = 0.5 * R_bar + 0.3 * R_bar * (k_tot / n) + 0.2 * R_max
//!
//! minority protection, f* = argmax R_i:
//!   if R_max >= 8.5 and k(f*) >= 1 and reviewers(f*) ∩ protected != ∅
//!   CS_final = max(CS, 0.7 * R_max + 2.0)
//! ```
//!
//! Tiers are assigned on `CS_final` by [`Tier::from_score`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::findings::DeduplicatedFinding;
use crate::findings::raw::{MAX_SCORE, MIN_SCORE};
use crate::types::{Domain, Tier};

/// Weight of the mean relevance term.
pub const MEAN_WEIGHT: f64 = 0.5;
/// Weight of the agreement-density term.
pub const AGREEMENT_WEIGHT: f64 = 0.3;
/// Weight of the peak relevance term.
pub const PEAK_WEIGHT: f64 = 0.2;
/// Slope of the protected floor `0.7 * R_max + 2.0`.
pub const PROTECTION_SLOPE: f64 = 0.7;
/// Offset of the protected floor.
pub const PROTECTION_OFFSET: f64 = 2.0;

pub const DEFAULT_REVIEWER_COUNT: usize = 5;
pub const DEFAULT_PROTECTION_THRESHOLD: f64 = 8.5;

/// Scorer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// `n` in the agreement term.
    pub reviewer_count: usize,
    /// Minimum `R_max` for minority protection to fire.
    pub protection_threshold: f64,
    /// Reviewer domains whose lone findings are protected from dilution.
    pub protected_domains: Vec<Domain>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            reviewer_count: DEFAULT_REVIEWER_COUNT,
            protection_threshold: DEFAULT_PROTECTION_THRESHOLD,
            protected_domains: vec![Domain::Reliability, Domain::Security],
        }
    }
}

/// A deduplicated finding with its relevance score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredFinding {
    #[serde(flatten)]
    pub finding: DeduplicatedFinding,
    /// Weight applied to this finding, in (0, 1].
    pub weight: f64,
    /// Weighted relevance `R_i`.
    pub r_i: f64,
    /// Tier of `R_i` taken on its own.
    pub tier: Tier,
}

/// Verdict for one review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusScoreResult {
    /// Final consensus score, after minority protection.
    pub cs: f64,
    pub tier: Tier,
    /// Active findings, highest `R_i` first.
    pub findings: Vec<ScoredFinding>,
    pub r_bar: f64,
    pub r_max: f64,
    pub k_total: usize,
    pub n: usize,
    pub passed: bool,
    pub minority_protection_applied: bool,
    pub summary: String,
}

impl ConsensusScoreResult {
    /// Verdict for a review with nothing to report.
    pub fn empty(n: usize) -> Self {
        let mut result = Self {
            cs: 0.0,
            tier: Tier::Informational,
            findings: Vec::new(),
            r_bar: 0.0,
            r_max: 0.0,
            k_total: 0,
            n,
            passed: true,
            minority_protection_applied: false,
            summary: String::new(),
        };
        result.summary = result.render_summary();
        result
    }

    fn render_summary(&self) -> String {
        let count = self.findings.len();
        let plural = if count == 1 { "" } else { "s" };
        let verdict = if self.passed { "PASS" } else { "FAIL" };
        let protection = if self.minority_protection_applied {
            ", minority protection applied"
        } else {
            ""
        };
        format!(
            "CS {:.2} ({}) across {count} finding{plural}: {verdict}{protection}",
            self.cs, self.tier
        )
    }
}

/// Computes [`ConsensusScoreResult`]s.
#[derive(Clone, Debug, Default)]
pub struct ConsensusScorer {
    config: ScoringConfig,
}

impl ConsensusScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score `findings`, optionally weighted by fingerprint.
    ///
    /// Missing weights default to 1.0, weights are clamped to [0, 1], and a
    /// finding with weight 0 is left out entirely. No active findings yields
    /// CS 0, informational, passed.
    pub fn score(
        &self,
        findings: &[DeduplicatedFinding],
        weights: Option<&HashMap<String, f64>>,
    ) -> ConsensusScoreResult {
        crate::measure_time!("consensus_score", self.score_inner(findings, weights))
    }

    fn score_inner(
        &self,
        findings: &[DeduplicatedFinding],
        weights: Option<&HashMap<String, f64>>,
    ) -> ConsensusScoreResult {
        let n = self.config.reviewer_count.max(1);

        let mut scored: Vec<ScoredFinding> = findings
            .iter()
            .filter_map(|finding| {
                let weight = resolve_weight(weights, &finding.fingerprint);
                if weight <= 0.0 {
                    return None;
                }
                let r_i = relevance(finding.severity, finding.confidence) * weight;
                Some(ScoredFinding {
                    finding: finding.clone(),
                    weight,
                    r_i,
                    tier: Tier::from_score(r_i),
                })
            })
            .collect();

        if scored.is_empty() {
            debug!(input = findings.len(), "no active findings to score");
            return ConsensusScoreResult::empty(n);
        }

        scored.sort_by(|a, b| {
            b.r_i
                .total_cmp(&a.r_i)
                .then_with(|| a.finding.fingerprint.cmp(&b.finding.fingerprint))
        });

        let r_sum: f64 = scored.iter().map(|f| f.r_i).sum();
        let r_bar = r_sum / scored.len() as f64;
        let r_max = scored.iter().map(|f| f.r_i).fold(0.0, f64::max);
        let k_total: usize = scored.iter().map(|f| f.finding.k).sum();

        let base = MEAN_WEIGHT * r_bar
            + AGREEMENT_WEIGHT * r_bar * (k_total as f64 / n as f64)
            + PEAK_WEIGHT * r_max;

        let protected = r_max >= self.config.protection_threshold
            && scored
                .iter()
                .take_while(|f| f.r_i == r_max)
                .any(|f| self.is_protected(&f.finding));

        let cs = if protected {
            base.max(PROTECTION_SLOPE * r_max + PROTECTION_OFFSET)
        } else {
            base
        };
        let minority_protection_applied = protected;

        let tier = Tier::from_score(cs);
        let mut result = ConsensusScoreResult {
            cs,
            tier,
            findings: scored,
            r_bar,
            r_max,
            k_total,
            n,
            passed: tier.passes(),
            minority_protection_applied,
            summary: String::new(),
        };
        result.summary = result.render_summary();

        debug!(
            cs,
            base,
            r_bar,
            r_max,
            k_total,
            n,
            tier = %tier,
            minority_protection_applied,
            "consensus scored"
        );
        result
    }

    /// Whether `finding` was raised by at least one reviewer in a protected
    /// domain.
    fn is_protected(&self, finding: &DeduplicatedFinding) -> bool {
        finding.k >= 1
            && finding.reviewer_ids.iter().any(|id| {
                Domain::from_reviewer_id(id)
                    .is_some_and(|domain| self.config.protected_domains.contains(&domain))
            })
    }
}

/// Unweighted relevance `clamp(severity * confidence / 10, 0, 10)`, with both
/// inputs first clamped to [0, 10].
pub fn relevance(severity: f64, confidence: f64) -> f64 {
    let severity = severity.clamp(MIN_SCORE, MAX_SCORE);
    let confidence = confidence.clamp(MIN_SCORE, MAX_SCORE);
    let raw = severity * confidence / 10.0;
    if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 10.0) }
}

fn resolve_weight(weights: Option<&HashMap<String, f64>>, fingerprint: &str) -> f64 {
    match weights.and_then(|w| w.get(fingerprint)) {
        None => 1.0,
        Some(&weight) if weight.is_nan() => {
            warn!(fingerprint, "ignoring NaN weight");
            1.0
        }
        Some(&weight) => weight.clamp(0.0, 1.0),
    }
}
