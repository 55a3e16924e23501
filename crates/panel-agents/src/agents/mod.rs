//! Panel roles.
//!
//! Raters and the mediator reach the model only through a shared
//! [`RatingCapability`]; the judge is a pure function in `coordination`;
//! the human is an [`InterventionSource`]. `PanelFactory` builds the
//! model-backed roles from a `PanelConfig`.

pub mod conversation;
pub mod human;
pub mod mediator;
pub mod rater;

use std::sync::Arc;

pub use conversation::Conversation;
pub use human::{ConsoleExpert, InterventionSource, NoIntervention, ScriptedExpert};
pub use mediator::Mediator;
pub use rater::RaterAgent;

use crate::capability::RatingCapability;
use crate::config::PanelConfig;

/// The closed set of panel roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Rater(usize),
    Judge,
    Mediator,
    Human,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rater(i) => write!(f, "rater-{}", i + 1),
            Self::Judge => write!(f, "judge"),
            Self::Mediator => write!(f, "mediator"),
            Self::Human => write!(f, "human"),
        }
    }
}

/// Builds raters and the mediator over one shared capability.
pub struct PanelFactory {
    capability: Arc<dyn RatingCapability>,
    config: PanelConfig,
}

impl PanelFactory {
    pub fn new(config: &PanelConfig, capability: Arc<dyn RatingCapability>) -> Self {
        Self {
            capability,
            config: config.clone(),
        }
    }

    /// One rater per active persona, all starting from `codebook`.
    pub fn build_raters(&self, codebook: &str) -> Vec<RaterAgent> {
        self.config
            .active_personas()
            .iter()
            .enumerate()
            .map(|(id, persona)| RaterAgent::new(id, persona, codebook, self.capability.clone()))
            .collect()
    }

    pub fn build_mediator(&self) -> Mediator {
        Mediator::new(self.config.prompt.mediator.clone(), self.capability.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display() {
        assert_eq!(AgentRole::Rater(0).to_string(), "rater-1");
        assert_eq!(AgentRole::Mediator.to_string(), "mediator");
    }
}
