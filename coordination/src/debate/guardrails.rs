//! Round bounds and termination outcomes for discussion and mediation loops.
//!
//! Non-agreement is never an error: when the bound is exhausted the last
//! state is accepted and the reason is recorded here.

use serde::{Deserialize, Serialize};

/// How a discussion of one text item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscussionTermination {
    /// The judge reported agreement after `round`.
    ConsensusReached { round: u32 },
    /// All `rounds` ran without agreement; the last round's answers stand.
    RoundsExhausted { rounds: u32 },
}

impl DiscussionTermination {
    pub fn consensus_reached(&self) -> bool {
        matches!(self, Self::ConsensusReached { .. })
    }

    /// Number of discussion rounds that ran.
    pub fn rounds(&self) -> u32 {
        match self {
            Self::ConsensusReached { round } => *round,
            Self::RoundsExhausted { rounds } => *rounds,
        }
    }
}

impl std::fmt::Display for DiscussionTermination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsensusReached { round } => write!(f, "consensus_reached (round {})", round),
            Self::RoundsExhausted { rounds } => write!(f, "rounds_exhausted ({})", rounds),
        }
    }
}

/// How codebook evolution ended for a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvolutionTermination {
    /// No rater asked for a change; mediation never ran.
    Unchanged,
    /// Every reviewer accepted the summary from `round`.
    ConsensusReached { round: u32 },
    /// Bound hit; the last mediated summary was adopted anyway.
    RoundsExhausted { rounds: u32 },
}

impl EvolutionTermination {
    /// Whether a mediated summary replaced the codebook.
    pub fn codebook_replaced(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl std::fmt::Display for EvolutionTermination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::ConsensusReached { round } => write!(f, "consensus_reached (round {})", round),
            Self::RoundsExhausted { rounds } => write!(f, "rounds_exhausted ({})", rounds),
        }
    }
}

/// Upper bound on discussion and mediation rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundGuard {
    max_rounds: u32,
}

impl RoundGuard {
    pub fn new(max_rounds: u32) -> Self {
        Self { max_rounds }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Whether 1-based `round` is within the bound.
    pub fn allows(&self, round: u32) -> bool {
        round >= 1 && round <= self.max_rounds
    }

    /// Whether `round` is the final permitted round.
    pub fn is_last(&self, round: u32) -> bool {
        round >= self.max_rounds
    }

    /// Iterator over every permitted round number.
    pub fn rounds(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_rounds
    }

    /// Termination for a discussion that stopped at `round` with the given verdict.
    pub fn discussion_outcome(&self, round: u32, agreed: bool) -> DiscussionTermination {
        if agreed {
            DiscussionTermination::ConsensusReached { round }
        } else {
            DiscussionTermination::RoundsExhausted { rounds: round }
        }
    }
}
