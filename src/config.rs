use crate::error::{PipelineError, Result};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-6";

/// Tunable policy parameters for the extraction pipeline.
///
/// Defaults mirror production behavior; the sibling window in particular is
/// a policy knob rather than a constant, so callers can tighten or widen how
/// aggressively co-uploaded financial models are offered as merge candidates.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model identifier passed to the language-model capability.
    pub model: String,
    /// Maximum characters of document text sent to a single extraction call.
    pub text_budget: usize,
    /// Maximum characters of document text sampled for classification.
    pub classifier_sample: usize,
    /// Below this many characters of extracted text, a page-based document
    /// is treated as image-heavy and flagged for visual extraction.
    pub min_useful_text_len: usize,
    /// Trailing window within which unassigned financial-model uploads are
    /// offered as merge candidates for each other.
    pub sibling_window_secs: i64,
    /// Maximum characters of the latest document excerpt included in insight
    /// generation context.
    pub insight_excerpt_budget: usize,
    /// Bounded retry count for upstream language-model failures.
    pub max_retries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            text_budget: 50_000,
            classifier_sample: 20_000,
            min_useful_text_len: 200,
            sibling_window_secs: 300,
            insight_excerpt_budget: 10_000,
            max_retries: 2,
        }
    }
}

/// Credentials for the live language-model client, read from the
/// environment so they never appear in configuration files.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
}

impl LlmSettings {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| PipelineError::MissingConfig("ANTHROPIC_API_KEY".to_string()))?;
        Ok(Self { api_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PipelineConfig::default();
        assert!(config.text_budget > config.classifier_sample);
        assert!(config.sibling_window_secs > 0);
        assert_eq!(config.model, DEFAULT_MODEL);
    }
}
