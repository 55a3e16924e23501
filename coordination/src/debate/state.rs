//! Chunk phase state machine — phases, transitions, and session tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of a chunk as it moves through the consensus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPhase {
    /// Created, no rater has been asked anything yet.
    Pending,
    /// Every rater codes every text item independently.
    Coding,
    /// Disagreeing items are discussed in bounded rounds.
    Discussion,
    /// Raters propose, mediate and review a new codebook.
    Evolution,
    /// Chunk sealed; the adopted codebook is final.
    Complete,
}

impl ChunkPhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        self == Self::Complete
    }

    /// Valid transitions from this phase. Phases are strictly ordered.
    pub fn valid_transitions(self) -> &'static [ChunkPhase] {
        match self {
            Self::Pending => &[Self::Coding],
            Self::Coding => &[Self::Discussion],
            Self::Discussion => &[Self::Evolution],
            Self::Evolution => &[Self::Complete],
            Self::Complete => &[],
        }
    }
}

impl std::fmt::Display for ChunkPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Coding => write!(f, "coding"),
            Self::Discussion => write!(f, "discussion"),
            Self::Evolution => write!(f, "evolution"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: ChunkPhase,
    pub to: ChunkPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid state transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition {from} → {to}: {reason}")]
pub struct TransitionError {
    pub from: ChunkPhase,
    pub to: ChunkPhase,
    pub reason: String,
}

/// Tracks where one chunk is in the cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSession {
    pub chunk_id: usize,
    pub phase: ChunkPhase,
    pub transitions: Vec<PhaseTransition>,
    pub created_at: DateTime<Utc>,
}

impl ChunkSession {
    pub fn new(chunk_id: usize) -> Self {
        Self {
            chunk_id,
            phase: ChunkPhase::Pending,
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Move to `to`, rejecting anything out of order.
    pub fn advance(&mut self, to: ChunkPhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
                reason: format!(
                    "not a valid transition (allowed: {:?})",
                    self.phase.valid_transitions()
                ),
            });
        }

        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] chunk {} | {} transitions",
            self.phase,
            self.chunk_id,
            self.transitions.len()
        )
    }
}
