use std::sync::Arc;

use log::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::llm::prompts::{classification_prompt, truncate_text};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::schema::Classification;

/// Decides whether a document describes a specific property deal or a
/// fund/strategy thesis. The model's answer is trusted as-is; no hand-coded
/// rule overrides it. Temperature is pinned to zero so the same text maps to
/// the same label.
pub struct DocumentClassifier {
    llm: Arc<dyn LanguageModel>,
    sample_budget: usize,
}

impl DocumentClassifier {
    pub fn new(llm: Arc<dyn LanguageModel>, config: &PipelineConfig) -> Self {
        Self {
            llm,
            sample_budget: config.classifier_sample,
        }
    }

    pub async fn classify(&self, document_text: &str) -> Result<Classification> {
        let sample = truncate_text(document_text, self.sample_budget);
        let request = CompletionRequest::new(classification_prompt(&sample)).with_max_tokens(10);
        let reply = self.llm.complete(request).await?;

        let label = reply.trim().to_lowercase();
        let classification = match label.as_str() {
            "deal" => Classification::Deal,
            "fund" => Classification::Fund,
            other => {
                // Under-specifying is less harmful than losing the document.
                warn!("Unexpected classification reply '{}', defaulting to deal", other);
                Classification::Deal
            }
        };
        info!("Classified document as {}", classification);
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedModel {
        reply: String,
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            assert_eq!(request.temperature, 0.0);
            Ok(self.reply.clone())
        }
    }

    fn classifier(reply: &str) -> DocumentClassifier {
        DocumentClassifier::new(
            Arc::new(CannedModel {
                reply: reply.to_string(),
            }),
            &PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_fund_label_accepted() {
        let result = classifier("fund").classify("$20M fund size, GP commitment, target IRR").await;
        assert_eq!(result.unwrap(), Classification::Fund);
    }

    #[tokio::test]
    async fn test_label_whitespace_and_case_tolerated() {
        assert_eq!(classifier(" Deal\n").classify("text").await.unwrap(), Classification::Deal);
        assert_eq!(classifier("FUND").classify("text").await.unwrap(), Classification::Fund);
    }

    #[tokio::test]
    async fn test_unexpected_reply_defaults_to_deal() {
        let result = classifier("this looks like a deal deck to me").classify("text").await;
        assert_eq!(result.unwrap(), Classification::Deal);
    }
}
