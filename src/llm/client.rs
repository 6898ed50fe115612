use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::config::{LlmSettings, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::llm::{CompletionRequest, LanguageModel};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const INITIAL_BACKOFF_MS: u64 = 500;

/// Live client for the Anthropic messages API. Retries transient upstream
/// failures a bounded number of times with exponential backoff, then
/// surfaces a typed failure, never a partial result.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_retries: usize,
}

impl AnthropicClient {
    pub fn new(api_key: String, config: &PipelineConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        }
    }

    pub fn from_env(config: &PipelineConfig) -> Result<Self> {
        let settings = LlmSettings::from_env()?;
        Ok(Self::new(settings.api_key, config))
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/messages", self.base_url);
        let payload = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::UpstreamUnavailable(format!(
                "API error (status {}): {}",
                status, body
            )));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::UpstreamUnavailable(e.to_string()))?;

        body.content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| {
                PipelineError::UpstreamUnavailable("Model returned no text content".to_string())
            })
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match self.send_once(&request).await {
                Ok(text) => {
                    if attempt > 0 {
                        info!("Model call succeeded after {} retries", attempt);
                    }
                    return Ok(text);
                }
                Err(e) => {
                    warn!(
                        "Model call failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PipelineError::UpstreamUnavailable("Model call never attempted".to_string())
        }))
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_shape() {
        let payload = MessagesRequest {
            model: "claude-sonnet-4-6",
            max_tokens: 1024,
            temperature: 0.0,
            system: None,
            messages: vec![Message {
                role: "user",
                content: "classify this",
            }],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-6");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_response_deserialization() {
        let raw = r#"{"content":[{"type":"text","text":"deal"}],"stop_reason":"end_turn"}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content[0].text, "deal");
    }
}
