//! Private conversation state owned by one agent.

use crate::capability::ChatMessage;

/// System framing plus the turns accumulated since the last reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    system_prompt: String,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Phase framing issued by the orchestrator.
    pub fn push_instruction(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::system(content));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Drop every turn, keeping only the system framing.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Install a new system framing and clear the turns.
    pub fn replace_system_prompt(&mut self, system_prompt: impl Into<String>) {
        self.system_prompt = system_prompt.into();
        self.reset();
    }

    /// Full context for the next call, system framing first.
    pub fn as_messages(&self) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        out.push(ChatMessage::system(self.system_prompt.clone()));
        out.extend(self.messages.iter().cloned());
        out
    }

    /// Number of turns since the last reset.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
