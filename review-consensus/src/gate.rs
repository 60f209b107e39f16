//! Gate decision: combine a verdict with the bypass ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::ledger::BypassLedger;
use crate::scoring::ConsensusScoreResult;

/// Whether a change may proceed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// The verdict passed on its own.
    Passed,
    /// The verdict failed and no active bypass exists.
    Blocked,
    /// The verdict failed but a human override is in effect.
    Bypassed {
        bypass_id: Uuid,
        expires_at: DateTime<Utc>,
    },
}

impl GateDecision {
    /// Whether the change may proceed.
    pub fn allows(&self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// Decide whether `task_id` may proceed given its verdict.
pub fn evaluate_gate(result: &ConsensusScoreResult, ledger: &BypassLedger, task_id: &str) -> GateDecision {
    evaluate_gate_at(result, ledger, task_id, Utc::now())
}

pub fn evaluate_gate_at(
    result: &ConsensusScoreResult,
    ledger: &BypassLedger,
    task_id: &str,
    now: DateTime<Utc>,
) -> GateDecision {
    let decision = if result.passed {
        GateDecision::Passed
    } else {
        match ledger.active_bypass_for_at(task_id, now) {
            Some(record) => GateDecision::Bypassed {
                bypass_id: record.bypass_id,
                expires_at: record.expires_at,
            },
            None => GateDecision::Blocked,
        }
    };

    info!(task_id, cs = result.cs, tier = %result.tier, ?decision, "gate evaluated");
    decision
}
