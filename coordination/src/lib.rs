//! Deterministic core of the rater panel.
//!
//! This crate holds everything that does not talk to a language model:
//! - Structured response schemas shared by all rater-facing phases
//! - The agreement judge and the per-chunk phase state machine
//! - Discussion history, round guards and termination outcomes
//! - Human intervention policy types
//! - Corpus loading, chunking and ground truth
//! - Persisted chunk/run records and the evaluation collaborator
//!
//! The model-driven side (raters, mediator, orchestrator) lives in
//! `panel-agents`.

#![allow(clippy::uninlined_format_args)]

pub mod analytics;
pub mod corpus;
pub mod debate;
pub mod intervention;
pub mod schema;

pub use analytics::{Evaluator, RunEvaluation};
pub use corpus::{Chunk, Corpus, CorpusError, GroundTruth, TextId, TextItem};
pub use debate::{
    check_agreement, check_codebook_agreement, ChunkPhase, ChunkRecord, ChunkSession,
    DiscussionHistory, DiscussionTermination, EvolutionTermination, ResultWriter, RoundGuard,
};
pub use intervention::{
    InterventionAuthority, InterventionPoint, InterventionPolicy, InterventionRecord,
    InterventionScope,
};
pub use schema::{CodebookUpdate, CodingResponse, StructuredResponse};
