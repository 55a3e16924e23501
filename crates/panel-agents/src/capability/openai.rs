//! OpenAI-compatible chat completions client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{ChatMessage, RatingCapability, ResponseSchema};
use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};

pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    seed: Option<u64>,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> PanelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PanelError::Configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            temperature: 0.0,
            seed: None,
        })
    }

    /// Client for a run, seeded with `seed`.
    pub fn from_config(config: &PanelConfig, seed: u64) -> PanelResult<Self> {
        let client = Self::new(
            config.base_url(),
            config.api_key.clone(),
            config.settings.model.clone(),
            Duration::from_secs(config.settings.request_timeout_secs),
        )?;
        Ok(client
            .with_temperature(config.settings.temperature)
            .with_seed(seed))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "n": 1,
        });
        if let Some(seed) = self.seed {
            body["seed"] = serde_json::json!(seed);
        }
        if let Some(schema) = schema {
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "schema": schema.schema,
                    "strict": false,
                }
            });
        }
        body
    }
}

#[async_trait]
impl RatingCapability for OpenAiChatClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        schema: Option<&ResponseSchema>,
    ) -> PanelResult<String> {
        let start = Instant::now();
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&self.request_body(messages, schema));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PanelError::InferenceFailure(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(PanelError::RateLimit(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PanelError::InferenceFailure(format!(
                "chat completions error ({status}): {body}"
            )));
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PanelError::InferenceFailure(format!("unreadable response: {e}")))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                PanelError::parse(
                    schema.map(|s| s.name).unwrap_or("text"),
                    "response had no message content",
                )
            })?
            .to_string();

        debug!(
            model = %self.model,
            schema = schema.map(|s| s.name).unwrap_or("text"),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion received"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::CodingResponse;

    fn client() -> OpenAiChatClient {
        OpenAiChatClient::new(
            "http://localhost:8000/v1/",
            None,
            "test-model",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(client().endpoint, "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn structured_request_carries_schema() {
        let schema = ResponseSchema::of::<CodingResponse>();
        let body = client()
            .with_seed(7)
            .request_body(&[ChatMessage::user("TEXT:\nhello")], Some(&schema));
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["seed"], 7);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["response_format"]["json_schema"]["name"], "coding_response");
        assert_eq!(body["response_format"]["json_schema"]["strict"], false);
    }

    #[test]
    fn free_text_request_has_no_format() {
        let body = client().request_body(&[ChatMessage::system("mediate")], None);
        assert!(body.get("response_format").is_none());
        assert!(body.get("seed").is_none());
    }
}
