//! Shared vocabulary for review verdicts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Relevance domains a file or reviewer can belong to.
///
/// Variants are declared alphabetically so that sorting by enum order and
/// sorting by [`Domain::as_str`] agree.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Correctness,
    Maintainability,
    Performance,
    Reliability,
    Security,
}

impl Domain {
    /// All domains in sorted order
    pub fn all() -> [Self; 5] {
        [
            Self::Correctness,
            Self::Maintainability,
            Self::Performance,
            Self::Reliability,
            Self::Security,
        ]
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correctness => "correctness",
            Self::Maintainability => "maintainability",
            Self::Performance => "performance",
            Self::Reliability => "reliability",
            Self::Security => "security",
        }
    }

    /// Parse a domain name (case-insensitive, surrounding whitespace ignored)
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::all()
            .into_iter()
            .find(|domain| domain.as_str() == normalized)
    }

    /// Map a reviewer id onto the domain it reviews for.
    ///
    /// Reviewers are named after their domain, optionally with a suffix:
    /// `security`, `Security-Reviewer`, `reliability_2` all match.
    pub fn from_reviewer_id(reviewer_id: &str) -> Option<Self> {
        let normalized = reviewer_id.trim().to_ascii_lowercase().replace(['-', ' ', ':'], "_");
        let trimmed = normalized.trim_matches('_');

        if trimmed.is_empty() {
            return None;
        }

        Self::all().into_iter().find(|domain| {
            let name = domain.as_str();
            trimmed == name
                || trimmed
                    .strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('_'))
        })
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discretized severity bucket derived from a consensus score.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// CS < 4.0
    Informational,
    /// 4.0 <= CS < 7.0
    Moderate,
    /// 7.0 <= CS < 9.0
    Important,
    /// CS >= 9.0
    Critical,
}

impl Tier {
    /// Lower bound of the moderate tier
    pub const MODERATE_FLOOR: f64 = 4.0;
    /// Lower bound of the important tier
    pub const IMPORTANT_FLOOR: f64 = 7.0;
    /// Lower bound of the critical tier
    pub const CRITICAL_FLOOR: f64 = 9.0;

    /// Classify a score into its tier.
    pub fn from_score(score: f64) -> Self {
        if score >= Self::CRITICAL_FLOOR {
            Self::Critical
        } else if score >= Self::IMPORTANT_FLOOR {
            Self::Important
        } else if score >= Self::MODERATE_FLOOR {
            Self::Moderate
        } else {
            Self::Informational
        }
    }

    /// Whether a verdict in this tier lets the change through
    pub fn passes(&self) -> bool {
        matches!(self, Self::Informational | Self::Moderate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Moderate => "moderate",
            Self::Important => "important",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_order_matches_name_order() {
        let mut names: Vec<&str> = Domain::all().iter().map(Domain::as_str).collect();
        let enum_order = names.clone();
        names.sort_unstable();
        assert_eq!(names, enum_order);
    }

    #[test]
    fn reviewer_ids_map_to_domains() {
        assert_eq!(Domain::from_reviewer_id("security"), Some(Domain::Security));
        assert_eq!(
            Domain::from_reviewer_id("Security-Reviewer"),
            Some(Domain::Security)
        );
        assert_eq!(
            Domain::from_reviewer_id("reliability_2"),
            Some(Domain::Reliability)
        );
        assert_eq!(Domain::from_reviewer_id("securityish"), None);
        assert_eq!(Domain::from_reviewer_id("gemini"), None);
        assert_eq!(Domain::from_reviewer_id("  "), None);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(Tier::from_score(0.0), Tier::Informational);
        assert_eq!(Tier::from_score(3.999), Tier::Informational);
        assert_eq!(Tier::from_score(4.0), Tier::Moderate);
        assert_eq!(Tier::from_score(6.999), Tier::Moderate);
        assert_eq!(Tier::from_score(7.0), Tier::Important);
        assert_eq!(Tier::from_score(9.0), Tier::Critical);
        assert!(Tier::Moderate.passes());
        assert!(!Tier::Important.passes());
    }

    #[test]
    fn tier_serializes_snake_case() {
        let json = serde_json::to_string(&Tier::Informational).unwrap();
        assert_eq!(json, "\"informational\"");
        assert_eq!(Domain::parse(" Security "), Some(Domain::Security));
    }
}
