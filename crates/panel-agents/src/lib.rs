//! Panel agent runtime: rating capability, rater/mediator/human roles and
//! the consensus orchestrator that drives them chunk by chunk.

pub mod agents;
pub mod capability;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prompts;
pub mod simulation;

pub use config::PanelConfig;
pub use error::{PanelError, PanelResult, RetryCategory};
pub use orchestrator::{ConsensusOrchestrator, OrchestratorSettings};
pub use simulation::Simulation;
