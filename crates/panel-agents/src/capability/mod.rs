//! Rating capability: the one seam through which every role reaches a model.
//!
//! Raters and the mediator only ever see this trait. The production
//! implementation is an OpenAI-compatible chat client wrapped in a bounded
//! retry loop; tests substitute scripted capabilities.

pub mod openai;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use coordination::StructuredResponse;
use serde::{Deserialize, Serialize};

use crate::error::{PanelError, PanelResult};

pub use openai::OpenAiChatClient;
pub use retry::{RetryPolicy, RetryingCapability};

/// Speaker of one conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A JSON Schema the answer must conform to, plus a typed check that the
/// answer actually deserializes into the response type.
#[derive(Clone)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: serde_json::Value,
    validate: fn(&str) -> PanelResult<()>,
}

impl ResponseSchema {
    pub fn of<T: StructuredResponse>() -> Self {
        Self {
            name: T::SCHEMA_NAME,
            schema: T::response_schema(),
            validate: |raw| parse_structured::<T>(raw).map(|_| ()),
        }
    }

    /// Fails with `ParseFailure` unless `raw` parses as the response type.
    pub fn validate(&self, raw: &str) -> PanelResult<()> {
        (self.validate)(raw)
    }
}

impl std::fmt::Debug for ResponseSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSchema")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Produce the next assistant turn for a conversation.
///
/// With `schema = None` the answer is free text; otherwise it must be a
/// JSON document conforming to the schema.
#[async_trait]
pub trait RatingCapability: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> PanelResult<String>;
}

#[async_trait]
impl<T: RatingCapability + ?Sized> RatingCapability for Arc<T> {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> PanelResult<String> {
        (**self).generate(messages, schema).await
    }
}

/// Parse a structured answer, mapping malformed JSON to `ParseFailure`.
pub fn parse_structured<T: StructuredResponse>(raw: &str) -> PanelResult<T> {
    serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| PanelError::parse(T::SCHEMA_NAME, e.to_string()))
}

/// Ask for a structured answer and parse it.
///
/// [`RetryingCapability`] validates against the typed schema, so a malformed
/// answer there costs one attempt rather than the whole call.
pub async fn generate_structured<T: StructuredResponse>(
    capability: &dyn RatingCapability,
    messages: &[ChatMessage],
) -> PanelResult<(T, String)> {
    let schema = ResponseSchema::of::<T>();
    let raw = capability.generate(messages, Some(&schema)).await?;
    let parsed = parse_structured::<T>(&raw)?;
    Ok((parsed, raw))
}

/// Some backends wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
