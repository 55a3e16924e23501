//! Consensus cycle — judge, phase state machine, round guards, records.
//!
//! # Chunk Flow
//!
//! ```text
//! Pending → Coding → Discussion → Evolution → Complete
//!             │          │             │
//!             │          │             └─ propose → [all keep?] ─ yes → unchanged
//!             │          │                              └─ no → mediate ⇄ review (≤ N rounds)
//!             │          └─ per disagreeing item: discuss ⇄ judge (≤ N rounds)
//!             └─ per item: every rater codes → judge
//! ```

pub mod consensus;
pub mod guardrails;
pub mod history;
pub mod persistence;
pub mod state;

pub use consensus::{check_agreement, check_codebook_agreement, no_update_requested, AgreementJudge};
pub use guardrails::{DiscussionTermination, EvolutionTermination, RoundGuard};
pub use history::{peer_answers, DiscussionHistory};
pub use persistence::{
    load_run_record, validate_record, ChunkRecord, CodingPhaseRecord, DiscussionPhaseRecord,
    EvolutionRecord, IntegrityStatus, MediationRound, PersistenceError, ResultWriter,
};
pub use state::{ChunkPhase, ChunkSession, PhaseTransition, TransitionError};
