use std::sync::Arc;

use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::llm::prompts::{transcript_prompt, truncate_text};
use crate::llm::{clean_json_reply, CompletionRequest, LanguageModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Concerned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub description: String,
    pub assignee: Option<String>,
    pub priority: Priority,
}

/// Structured insights pulled from one call or meeting transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptInsights {
    pub key_decisions: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub risks: Vec<String>,
    pub sentiment: Sentiment,
}

// Wire shapes are looser than the public types: the model occasionally
// invents priority or sentiment labels, and those coerce to defaults with a
// warning instead of failing the whole transcript.

#[derive(Debug, Deserialize, JsonSchema)]
struct RawTranscriptInsights {
    #[schemars(description = "Key decisions made during the conversation")]
    key_decisions: Vec<String>,
    #[schemars(description = "Concrete follow-ups with assignee when clear from context")]
    action_items: Vec<RawActionItem>,
    #[schemars(description = "Risks, concerns, or red flags mentioned")]
    risks: Vec<String>,
    #[schemars(description = "Overall tone: positive, neutral, or concerned")]
    sentiment: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RawActionItem {
    #[schemars(description = "What needs to be done")]
    description: String,
    #[schemars(description = "Person responsible, or null when unclear")]
    assignee: Option<String>,
    #[schemars(description = "high, medium, or low")]
    priority: Option<String>,
}

/// Extracts decisions, action items, risks, and sentiment from conversation
/// transcripts attached to a case.
pub struct TranscriptExtractor {
    llm: Arc<dyn LanguageModel>,
    text_budget: usize,
}

impl TranscriptExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, config: &PipelineConfig) -> Self {
        Self {
            llm,
            text_budget: config.text_budget,
        }
    }

    pub async fn extract(
        &self,
        transcript_text: &str,
        topic: &str,
        date: &str,
    ) -> Result<TranscriptInsights> {
        let text = truncate_text(transcript_text, self.text_budget);
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(RawTranscriptInsights))?;
        let reply = self
            .llm
            .complete(CompletionRequest::new(transcript_prompt(
                &text, topic, date, &schema,
            )))
            .await?;

        let raw: RawTranscriptInsights = serde_json::from_str(&clean_json_reply(&reply))
            .map_err(|e| PipelineError::SchemaMismatch {
                schema: "transcript".to_string(),
                details: e.to_string(),
            })?;

        let insights = validate(raw);
        info!(
            "Transcript yielded {} decisions, {} action items, {} risks",
            insights.key_decisions.len(),
            insights.action_items.len(),
            insights.risks.len()
        );
        Ok(insights)
    }
}

fn validate(raw: RawTranscriptInsights) -> TranscriptInsights {
    let sentiment = match raw.sentiment.to_lowercase().as_str() {
        "positive" => Sentiment::Positive,
        "neutral" => Sentiment::Neutral,
        "concerned" => Sentiment::Concerned,
        other => {
            warn!("Invalid sentiment value '{}', defaulting to neutral", other);
            Sentiment::Neutral
        }
    };

    let action_items = raw
        .action_items
        .into_iter()
        .filter(|item| !item.description.trim().is_empty())
        .map(|item| {
            let priority = match item.priority.as_deref().map(str::to_lowercase).as_deref() {
                Some("high") => Priority::High,
                Some("low") => Priority::Low,
                Some("medium") | None => Priority::Medium,
                Some(other) => {
                    warn!("Invalid priority '{}', defaulting to medium", other);
                    Priority::Medium
                }
            };
            ActionItem {
                description: item.description,
                assignee: item.assignee,
                priority,
            }
        })
        .collect();

    TranscriptInsights {
        key_decisions: raw.key_decisions,
        action_items,
        risks: raw.risks,
        sentiment,
    }
}
