//! Mediator: reconciles codebook proposals into one candidate.

use std::sync::Arc;

use coordination::CodebookUpdate;
use tracing::debug;

use crate::capability::{ChatMessage, RatingCapability};
use crate::error::PanelResult;
use crate::prompts;

/// Stateless across calls: every mediation starts from a fresh context.
pub struct Mediator {
    system_prompt: String,
    capability: Arc<dyn RatingCapability>,
}

impl Mediator {
    pub fn new(system_prompt: impl Into<String>, capability: Arc<dyn RatingCapability>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            capability,
        }
    }

    /// Unified candidate codebook for `proposals`, as free text.
    pub async fn mediate(&self, proposals: &[CodebookUpdate]) -> PanelResult<String> {
        let messages = [
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(prompts::mediation_message(proposals)),
        ];
        let summary = self.capability.generate(&messages, None).await?;
        debug!(proposals = proposals.len(), summary = %summary, "Mediator answered");
        Ok(summary.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ResponseSchema;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        contexts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl RatingCapability for Recorder {
        async fn generate(
            &self,
            messages: &[ChatMessage],
            schema: Option<&ResponseSchema>,
        ) -> PanelResult<String> {
            assert!(schema.is_none());
            self.contexts.lock().unwrap().push(messages.to_vec());
            Ok("  1: pro\n2: con\n".to_string())
        }
    }

    #[tokio::test]
    async fn each_call_starts_fresh() {
        let recorder = Arc::new(Recorder {
            contexts: Mutex::new(Vec::new()),
        });
        let mediator = Mediator::new("mediate", recorder.clone());
        let proposals = vec![
            CodebookUpdate::propose("merge", "1: pro"),
            CodebookUpdate::propose("split", "1: pro\n2: con"),
        ];

        let first = mediator.mediate(&proposals).await.unwrap();
        mediator.mediate(&proposals[..1]).await.unwrap();
        assert_eq!(first, "1: pro\n2: con");

        let contexts = recorder.contexts.lock().unwrap();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].len(), 2);
        assert_eq!(contexts[1].len(), 2);
        assert!(contexts[0][1].content.contains("Agent 2's proposal:"));
        assert!(!contexts[1][1].content.contains("Agent 2's proposal:"));
    }
}
