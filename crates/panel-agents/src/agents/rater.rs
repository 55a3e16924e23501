//! Rater agent: one social scientist on the panel.

use std::sync::Arc;

use coordination::{CodebookUpdate, CodingResponse, StructuredResponse};
use tracing::debug;

use super::conversation::Conversation;
use crate::capability::{generate_structured, RatingCapability};
use crate::error::PanelResult;
use crate::prompts;

/// Holds a persona, the codebook it currently codes against, and a private
/// conversation. Every phase operation appends to that conversation.
pub struct RaterAgent {
    id: usize,
    persona: String,
    codebook: String,
    conversation: Conversation,
    capability: Arc<dyn RatingCapability>,
}

impl RaterAgent {
    pub fn new(
        id: usize,
        persona: impl Into<String>,
        codebook: impl Into<String>,
        capability: Arc<dyn RatingCapability>,
    ) -> Self {
        let persona = persona.into();
        let codebook = codebook.into();
        let conversation = Conversation::new(prompts::rater_system_prompt(&persona, &codebook));
        Self {
            id,
            persona,
            codebook,
            conversation,
            capability,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn codebook(&self) -> &str {
        &self.codebook
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn reset_conversation(&mut self) {
        self.conversation.reset();
    }

    /// Phase framing prompt from the orchestrator.
    pub fn add_instruction(&mut self, instruction: &str) {
        self.conversation.push_instruction(instruction);
    }

    pub async fn code_text(&mut self, text: &str) -> PanelResult<CodingResponse> {
        self.ask(prompts::coding_message(text)).await
    }

    /// One discussion round. `others` are every peer's previous-round
    /// answers in rater order, excluding this rater's own.
    pub async fn discuss(
        &mut self,
        text: &str,
        own_previous: &CodingResponse,
        others: &[CodingResponse],
    ) -> PanelResult<CodingResponse> {
        self.ask(prompts::discussion_message(text, own_previous, others))
            .await
    }

    pub async fn propose_codebook_update(
        &mut self,
        current_codebook: &str,
    ) -> PanelResult<CodebookUpdate> {
        self.ask(prompts::proposal_message(current_codebook)).await
    }

    pub async fn review_mediated_codebook(
        &mut self,
        mediator_message: &str,
    ) -> PanelResult<CodebookUpdate> {
        self.ask(mediator_message.to_string()).await
    }

    /// Append human guidance; the next phase operation answers with it in view.
    pub fn inject_intervention(&mut self, guidance: &str) {
        self.conversation.push_user(guidance);
    }

    /// Adopt a new codebook. Re-issues the persona framing and clears the
    /// conversation.
    pub fn update_codebook(&mut self, new_codebook: &str) {
        self.codebook = new_codebook.to_string();
        self.conversation
            .replace_system_prompt(prompts::rater_system_prompt(&self.persona, &self.codebook));
    }

    async fn ask<T: StructuredResponse>(&mut self, message: String) -> PanelResult<T> {
        self.conversation.push_user(message);
        let (answer, raw) =
            generate_structured::<T>(self.capability.as_ref(), &self.conversation.as_messages())
                .await?;
        debug!(rater = self.id, schema = T::SCHEMA_NAME, answer = %raw, "Rater answered");
        self.conversation.push_assistant(raw);
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ChatMessage, ResponseSchema};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every structured call with a fixed body and records contexts.
    struct Echo {
        body: &'static str,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl RatingCapability for Echo {
        async fn generate(
            &self,
            messages: &[ChatMessage],
            _schema: Option<&ResponseSchema>,
        ) -> PanelResult<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self.body.to_string())
        }
    }

    fn rater(body: &'static str) -> (RaterAgent, Arc<Echo>) {
        let echo = Arc::new(Echo {
            body,
            seen: Mutex::new(Vec::new()),
        });
        (RaterAgent::new(0, "A sociologist.", "1: pro\n2: con", echo.clone()), echo)
    }

    #[tokio::test]
    async fn code_text_extends_conversation() {
        let (mut rater, echo) = rater(r#"{"code": 2, "reasoning": "critical"}"#);
        rater.add_instruction("Code each text.");
        let answer = rater.code_text("Taxes are too high.").await.unwrap();
        assert_eq!(answer.code, 2);
        // instruction, user, assistant
        assert_eq!(rater.conversation().len(), 3);

        let seen = echo.seen.lock().unwrap();
        let context = &seen[0];
        assert!(context[0].content.contains("Persona:\nA sociologist."));
        assert!(context[0].content.contains("CODEBOOK:\n1: pro"));
        assert_eq!(context.last().unwrap().content, "TEXT:\nTaxes are too high.");
    }

    #[tokio::test]
    async fn intervention_is_visible_to_next_call() {
        let (mut rater, echo) = rater(r#"{"code": 1, "reasoning": "ok"}"#);
        let own = CodingResponse::new(2, "mine");
        rater.discuss("t", &own, &[]).await.unwrap();
        rater.inject_intervention("HUMAN EXPERT GUIDANCE:\nsarcasm is con");
        rater.discuss("t", &own, &[]).await.unwrap();

        let seen = echo.seen.lock().unwrap();
        assert!(seen[1]
            .iter()
            .any(|m| m.content.contains("sarcasm is con")));
    }

    #[tokio::test]
    async fn update_codebook_resets_and_reframes() {
        let (mut rater, _) = rater(r#"{"need_update": false, "reasoning": "fine"}"#);
        let verdict = rater.propose_codebook_update("1: pro\n2: con").await.unwrap();
        assert!(!verdict.need_update);
        assert!(!rater.conversation().is_empty());

        rater.update_codebook("1: pro\n2: con\n3: neutral");
        assert!(rater.conversation().is_empty());
        assert_eq!(rater.codebook(), "1: pro\n2: con\n3: neutral");
        assert!(rater.conversation().system_prompt().contains("3: neutral"));
        assert!(rater.conversation().system_prompt().contains("A sociologist."));
    }
}
