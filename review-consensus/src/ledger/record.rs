//! Bypass records

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BypassError;
use crate::scoring::ConsensusScoreResult;
use crate::types::Tier;

/// Hours a bypass stays active.
pub const BYPASS_TTL_HOURS: i64 = 24;

/// A human override of a failed verdict.
///
/// Records are appended to the ledger once and never modified.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BypassRecord {
    pub bypass_id: Uuid,
    pub task_id: String,
    /// Trimmed, never empty.
    pub reason: String,
    pub bypassed_by: String,
    pub created_at: DateTime<Utc>,
    /// `created_at` + 24h.
    pub expires_at: DateTime<Utc>,
    pub cs_at_bypass: f64,
    pub tier_at_bypass: Tier,
}

impl BypassRecord {
    /// Validate the request and build a record created at `now`.
    pub fn new_at(
        task_id: &str,
        reason: &str,
        bypassed_by: &str,
        result: &ConsensusScoreResult,
        now: DateTime<Utc>,
    ) -> Result<Self, BypassError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(BypassError::EmptyReason);
        }
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(BypassError::EmptyTaskId);
        }

        Ok(Self {
            bypass_id: Uuid::new_v4(),
            task_id: task_id.to_string(),
            reason: reason.to_string(),
            bypassed_by: bypassed_by.trim().to_string(),
            created_at: now,
            expires_at: now + Duration::hours(BYPASS_TTL_HOURS),
            cs_at_bypass: result.cs,
            tier_at_bypass: result.tier,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expired once `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ConsensusScoreResult;

    fn failed_result() -> ConsensusScoreResult {
        let mut result = ConsensusScoreResult::empty(5);
        result.cs = 7.985;
        result.tier = Tier::Important;
        result.passed = false;
        result
    }

    #[test]
    fn fresh_record_expires_in_exactly_24_hours() {
        let now = Utc::now();
        let record = BypassRecord::new_at("T1", "hotfix", "oncall", &failed_result(), now).unwrap();

        assert_eq!(record.expires_at - record.created_at, Duration::hours(24));
        assert!(!record.is_expired());
        assert!(!record.is_expired_at(now + Duration::hours(23)));
        assert!(record.is_expired_at(now + Duration::hours(24)));
        assert_eq!(record.cs_at_bypass, 7.985);
        assert_eq!(record.tier_at_bypass, Tier::Important);
        assert_eq!(record.bypass_id.get_version_num(), 4);
    }

    #[test]
    fn record_in_the_past_is_expired() {
        let created = Utc::now() - Duration::hours(25);
        let record = BypassRecord::new_at("T1", "old", "a", &failed_result(), created).unwrap();
        assert!(record.is_expired());
        assert_eq!(record.remaining_at(Utc::now()), Duration::zero());
    }

    #[test]
    fn blank_reason_and_task_are_rejected() {
        let result = failed_result();
        let now = Utc::now();
        assert!(matches!(
            BypassRecord::new_at("", "", "", &result, now),
            Err(BypassError::EmptyReason)
        ));
        assert!(matches!(
            BypassRecord::new_at("T1", "   ", "x", &result, now),
            Err(BypassError::EmptyReason)
        ));
        assert!(matches!(
            BypassRecord::new_at(" ", "reason", "x", &result, now),
            Err(BypassError::EmptyTaskId)
        ));
    }

    #[test]
    fn fields_are_trimmed() {
        let record =
            BypassRecord::new_at(" T9 ", "  release blocker  ", " alice ", &failed_result(), Utc::now())
                .unwrap();
        assert_eq!(record.task_id, "T9");
        assert_eq!(record.reason, "release blocker");
        assert_eq!(record.bypassed_by, "alice");
    }

    #[test]
    fn timestamps_serialize_as_rfc3339_utc() {
        let record = BypassRecord::new_at("T1", "r", "b", &failed_result(), Utc::now()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        let created = json["created_at"].as_str().unwrap();
        assert!(created.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(created).is_ok());
        assert_eq!(json["tier_at_bypass"], "important");
    }
}
