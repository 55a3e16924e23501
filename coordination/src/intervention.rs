//! Human intervention points and the policy deciding which ones are live.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::corpus::TextId;

/// How widely a human may intervene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionScope {
    /// Only discussion rounds.
    #[default]
    Targeted,
    /// Discussion rounds plus codebook proposal and review.
    Extensive,
}

/// Framing applied to the human's guidance before raters see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionAuthority {
    /// Guidance is one more perspective to weigh.
    #[default]
    Collaborative,
    /// Guidance is binding.
    Authoritative,
}

impl std::fmt::Display for InterventionAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collaborative => write!(f, "collaborative"),
            Self::Authoritative => write!(f, "authoritative"),
        }
    }
}

/// A phase boundary where the intervention source may be polled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum InterventionPoint {
    Discussion { text_id: TextId, round: u32 },
    CodebookProposal,
    CodebookReview { round: u32 },
}

impl std::fmt::Display for InterventionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discussion { text_id, round } => {
                write!(f, "discussion of {} round {}", text_id, round)
            }
            Self::CodebookProposal => write!(f, "codebook proposal"),
            Self::CodebookReview { round } => write!(f, "codebook review round {}", round),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InterventionPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub scope: InterventionScope,
    #[serde(default)]
    pub authority: InterventionAuthority,
}

impl InterventionPolicy {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether the source should be polled at `point`.
    pub fn allows(&self, point: &InterventionPoint) -> bool {
        if !self.enabled {
            return false;
        }
        match point {
            InterventionPoint::Discussion { .. } => true,
            InterventionPoint::CodebookProposal | InterventionPoint::CodebookReview { .. } => {
                self.scope == InterventionScope::Extensive
            }
        }
    }
}

/// An intervention that was actually applied, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionRecord {
    pub point: InterventionPoint,
    pub authority: InterventionAuthority,
    pub guidance: String,
    pub applied_at: DateTime<Utc>,
}

impl InterventionRecord {
    pub fn new(
        point: InterventionPoint,
        authority: InterventionAuthority,
        guidance: impl Into<String>,
    ) -> Self {
        Self {
            point,
            authority,
            guidance: guidance.into(),
            applied_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discussion_point() -> InterventionPoint {
        InterventionPoint::Discussion {
            text_id: TextId::from_index(0),
            round: 1,
        }
    }

    #[test]
    fn disabled_policy_allows_nothing() {
        let policy = InterventionPolicy::disabled();
        assert!(!policy.allows(&discussion_point()));
        assert!(!policy.allows(&InterventionPoint::CodebookProposal));
    }

    #[test]
    fn targeted_scope_only_discussion() {
        let policy = InterventionPolicy {
            enabled: true,
            scope: InterventionScope::Targeted,
            authority: InterventionAuthority::Collaborative,
        };
        assert!(policy.allows(&discussion_point()));
        assert!(!policy.allows(&InterventionPoint::CodebookProposal));
        assert!(!policy.allows(&InterventionPoint::CodebookReview { round: 1 }));
    }

    #[test]
    fn extensive_scope_covers_evolution() {
        let policy = InterventionPolicy {
            enabled: true,
            scope: InterventionScope::Extensive,
            authority: InterventionAuthority::Authoritative,
        };
        assert!(policy.allows(&discussion_point()));
        assert!(policy.allows(&InterventionPoint::CodebookProposal));
        assert!(policy.allows(&InterventionPoint::CodebookReview { round: 2 }));
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: InterventionPolicy = serde_json::from_str(r#"{"enabled": true}"#).unwrap();
        assert_eq!(policy.scope, InterventionScope::Targeted);
        assert_eq!(policy.authority, InterventionAuthority::Collaborative);
    }

    #[test]
    fn point_display() {
        assert_eq!(discussion_point().to_string(), "discussion of Text-1 round 1");
    }
}
