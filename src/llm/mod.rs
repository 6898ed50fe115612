//! Language-model capability and the extraction passes built on it.
//!
//! The model is an untyped black box at the system boundary: everything in
//! the pipeline talks to the narrow [`LanguageModel`] trait, so the rest of
//! the crate stays deterministic and unit-testable against a substituted
//! implementation.

pub mod classifier;
#[cfg(feature = "anthropic")]
pub mod client;
pub mod extractor;
pub mod insight;
pub mod prompts;
pub mod transcript;

pub use classifier::*;
#[cfg(feature = "anthropic")]
pub use client::*;
pub use extractor::*;
pub use insight::*;
pub use transcript::*;

use async_trait::async_trait;

use crate::error::Result;

/// One completion request against the capability: `(text, constraints) ->
/// structured text | typed failure`.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 4096,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// The capability interface: given text, return text, failing with a typed
/// error on timeout or transport problems. Implementations must not retry
/// beyond their own bounded policy.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Strip markdown code fences and surrounding chatter from a model reply,
/// leaving the outermost JSON value.
pub(crate) fn clean_json_reply(raw: &str) -> String {
    let trimmed = raw.trim();
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return trimmed[start..=end].to_string();
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end {
            return trimmed[start..=end].to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_reply_strips_fences() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(clean_json_reply(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_json_reply_strips_prose() {
        let raw = "Here is the extraction:\n{\"a\": 1}\nLet me know!";
        assert_eq!(clean_json_reply(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_json_reply_passes_plain_text_through() {
        assert_eq!(clean_json_reply("  deal \n"), "deal");
    }
}
