//! Structured response schemas shared by every rater-facing phase.
//!
//! Both types double as JSON Schemas (via `schemars`) so the rating
//! capability can constrain model output to exactly these shapes.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A structured answer type a rater can be asked to produce.
pub trait StructuredResponse: Serialize + DeserializeOwned + JsonSchema {
    /// Schema name sent to the rating capability.
    const SCHEMA_NAME: &'static str;

    /// JSON Schema describing this response type.
    fn response_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(Self)).unwrap_or(serde_json::Value::Null)
    }
}

/// One rater's categorisation of one text item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CodingResponse {
    /// Integer category from the codebook.
    #[schemars(description = "Integer category assigned to the text according to the CODEBOOK")]
    pub code: i64,
    /// Free-text justification. Never compared by the judge.
    #[schemars(description = "Short justification for the assigned category")]
    pub reasoning: String,
}

impl CodingResponse {
    pub fn new(code: i64, reasoning: impl Into<String>) -> Self {
        Self {
            code,
            reasoning: reasoning.into(),
        }
    }
}

impl StructuredResponse for CodingResponse {
    const SCHEMA_NAME: &'static str = "coding_response";
}

impl std::fmt::Display for CodingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code: {}\nreasoning: {}", self.code, self.reasoning)
    }
}

/// Codebook proposal or review verdict.
///
/// As a proposal `need_update` is expected to be true and `new_codebook`
/// carries the replacement text. As a review of a mediated draft,
/// `need_update = false` means acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CodebookUpdate {
    #[schemars(description = "Whether the CODEBOOK still needs to change")]
    pub need_update: bool,
    #[schemars(description = "Reasoning behind the decision")]
    pub reasoning: String,
    #[schemars(description = "Full replacement CODEBOOK text when an update is needed")]
    #[serde(default)]
    pub new_codebook: Option<String>,
}

impl CodebookUpdate {
    /// A verdict accepting the current draft.
    pub fn accept(reasoning: impl Into<String>) -> Self {
        Self {
            need_update: false,
            reasoning: reasoning.into(),
            new_codebook: None,
        }
    }

    /// A proposal replacing the codebook with `new_codebook`.
    pub fn propose(reasoning: impl Into<String>, new_codebook: impl Into<String>) -> Self {
        Self {
            need_update: true,
            reasoning: reasoning.into(),
            new_codebook: Some(new_codebook.into()),
        }
    }

    /// Text a mediator should read for this entry: the proposed codebook when
    /// present, otherwise the stated reasoning.
    pub fn proposal_text(&self) -> &str {
        match self.new_codebook.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.reasoning,
        }
    }
}

impl StructuredResponse for CodebookUpdate {
    const SCHEMA_NAME: &'static str = "codebook_update";
}

impl std::fmt::Display for CodebookUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "need_update: {}\nreasoning: {}",
            self.need_update, self.reasoning
        )?;
        if let Some(codebook) = &self.new_codebook {
            write!(f, "\nnew_codebook:\n{}", codebook)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coding_response_schema_lists_fields() {
        let schema = CodingResponse::response_schema();
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("code"));
        assert!(props.contains_key("reasoning"));
    }

    #[test]
    fn codebook_update_parses_without_new_codebook() {
        let update: CodebookUpdate =
            serde_json::from_str(r#"{"need_update": false, "reasoning": "fine"}"#).unwrap();
        assert!(!update.need_update);
        assert!(update.new_codebook.is_none());
    }

    #[test]
    fn proposal_text_prefers_codebook() {
        let update = CodebookUpdate::propose("clarify 2", "1: pro\n2: contra");
        assert_eq!(update.proposal_text(), "1: pro\n2: contra");
    }

    #[test]
    fn proposal_text_falls_back_to_reasoning() {
        let mut update = CodebookUpdate::propose("merge categories", "");
        assert_eq!(update.proposal_text(), "merge categories");
        update.new_codebook = None;
        assert_eq!(update.proposal_text(), "merge categories");
    }

    #[test]
    fn coding_response_display() {
        let r = CodingResponse::new(3, "explicit stance");
        assert_eq!(r.to_string(), "code: 3\nreasoning: explicit stance");
    }
}
