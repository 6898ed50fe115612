//! # Dealflow Pipeline
//!
//! Document-ingestion pipeline for commercial real-estate deal management:
//! turns uploaded PDFs, Excel financial models, and free-text transcripts
//! into structured records via a language-model capability, reconciles
//! conflicting data with explicit source priority, resolves operator
//! identity, and generates regenerable narrative insight documents.
//!
//! ## Core Concepts
//!
//! - **Acquisition**: raw bytes become plain text and (for workbooks)
//!   labeled cell grids.
//! - **Extraction**: the spreadsheet path reads named metrics cell by cell;
//!   the document path runs a schema-constrained model call, routed by a
//!   deal/fund classifier.
//! - **Merge**: a narrative-source and financial-source pair combine with
//!   field-level priority: financial metrics always win, identity and
//!   narrative always come from the document.
//! - **Resolution**: extracted operator names map onto existing or new
//!   records, degrading to a shared flagged placeholder when a document
//!   never names its sponsor.
//! - **Insight**: a second model pass synthesizes the stored case into a
//!   sectioned memo, replaced wholesale on each regeneration.
//!
//! The model itself sits behind the narrow [`LanguageModel`] trait, so every
//! stage downstream of it is deterministic and testable against a fake.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dealflow_pipeline::*;
//!
//! let config = PipelineConfig::default();
//! let llm = Arc::new(AnthropicClient::from_env(&config)?);
//! let pipeline = Arc::new(ExtractionPipeline::new(llm, config));
//!
//! let intake = Intake::new(Arc::clone(&pipeline));
//! let submission = RawSubmission::new("deck.pdf", MediaType::Pdf, bytes);
//! let artifact_id = intake.submit(submission).await;
//! // ... poll intake.registry().status(artifact_id) until Completed ...
//! ```

pub mod acquire;
pub mod config;
pub mod error;
pub mod grid;
pub mod intake;
pub mod llm;
pub mod merge;
pub mod resolve;
pub mod schema;
pub mod spreadsheet;

pub use acquire::{acquire, AcquiredText, MediaType};
pub use config::{LlmSettings, PipelineConfig, DEFAULT_MODEL};
pub use error::{PipelineError, Result};
pub use grid::{CellGrid, CellValue, SheetCategory};
pub use intake::{
    suggest_siblings, ArtifactMeta, ArtifactRegistry, ArtifactStatus, Intake, RawSubmission,
    SiblingSuggestion, StatusReport,
};
pub use llm::*;
pub use merge::{merge, MergedExtraction, SourceTag};
pub use resolve::{
    resolve, InMemoryOperatorStore, OperatorRecord, OperatorStore, ResolutionKind, ResolvedEntity,
    PLACEHOLDER_OPERATOR_NAME,
};
pub use schema::*;
pub use spreadsheet::extract_financials;

use std::sync::Arc;

use log::{info, warn};

use crate::llm::classifier::DocumentClassifier;
use crate::llm::extractor::NarrativeExtractor;

/// Drives one artifact through acquisition, routing, and extraction.
///
/// Spreadsheets take the structured path (cell-level metric readings);
/// everything else is classified and run through the schema-constrained
/// narrative extraction. The result is ephemeral; callers merge, resolve,
/// and persist it immediately.
pub struct ExtractionPipeline {
    config: PipelineConfig,
    classifier: DocumentClassifier,
    extractor: NarrativeExtractor,
}

impl ExtractionPipeline {
    pub fn new(llm: Arc<dyn LanguageModel>, config: PipelineConfig) -> Self {
        Self {
            classifier: DocumentClassifier::new(Arc::clone(&llm), &config),
            extractor: NarrativeExtractor::new(llm, &config),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn process(&self, submission: &RawSubmission) -> Result<ExtractionResult> {
        info!(
            "Processing artifact {} ({}, {})",
            submission.id, submission.file_name, submission.media_type
        );
        let acquired = acquire::acquire(
            &submission.bytes,
            submission.media_type,
            self.config.min_useful_text_len,
        )?;

        if submission.media_type == MediaType::Spreadsheet {
            let financials = spreadsheet::extract_financials(&acquired.sheets);
            return Ok(ExtractionResult::from_financials(financials));
        }

        if acquired.needs_visual_extraction {
            return Err(PipelineError::Acquisition(format!(
                "Document text below useful threshold ({} pages); needs visual extraction",
                acquired.page_count
            )));
        }

        // A classifier failure is never fatal: the deal schema is the more
        // detailed of the two, so under-specifying beats losing the document.
        let classification = match self.classifier.classify(&acquired.plain_text).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!("Classification failed ({}); defaulting to deal", e);
                Classification::Deal
            }
        };

        self.extractor
            .extract(&acquired.plain_text, classification)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Replies with the classification first, then the extraction body.
    struct ScriptedModel {
        replies: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: std::sync::Mutex::new(
                    replies.iter().rev().map(|r| r.to_string()).collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| PipelineError::UpstreamUnavailable("script exhausted".to_string()))
        }
    }

    const DEAL_BODY: &str = r#"{
        "sponsors": [{"name": "Crestline Partners"}],
        "deal": {"deal_name": "Springdale Commons"},
        "principals": [],
        "underwriting": {"levered_irr": 0.25}
    }"#;

    #[tokio::test]
    async fn test_document_path_classifies_then_extracts() {
        let llm = ScriptedModel::new(&["deal", DEAL_BODY]);
        let pipeline = ExtractionPipeline::new(llm, PipelineConfig::default());
        let submission = RawSubmission::new(
            "deck.txt",
            MediaType::PlainText,
            b"Springdale Commons offering memorandum".to_vec(),
        );

        let result = pipeline.process(&submission).await.unwrap();
        assert_eq!(result.classification, Classification::Deal);
        assert_eq!(result.source, ExtractionSource::Narrative);
        assert_eq!(result.entity.unwrap().name, "Crestline Partners");
    }

    #[tokio::test]
    async fn test_classifier_failure_defaults_to_deal() {
        // First call (classification) fails, second (extraction) succeeds.
        struct FlakyModel {
            calls: std::sync::Mutex<usize>,
        }
        #[async_trait]
        impl LanguageModel for FlakyModel {
            async fn complete(&self, _request: CompletionRequest) -> Result<String> {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    Err(PipelineError::UpstreamUnavailable("timeout".to_string()))
                } else {
                    Ok(DEAL_BODY.to_string())
                }
            }
        }

        let pipeline = ExtractionPipeline::new(
            Arc::new(FlakyModel {
                calls: std::sync::Mutex::new(0),
            }),
            PipelineConfig::default(),
        );
        let submission =
            RawSubmission::new("deck.txt", MediaType::PlainText, b"memo text".to_vec());
        let result = pipeline.process(&submission).await.unwrap();
        assert_eq!(result.classification, Classification::Deal);
    }

    #[tokio::test]
    async fn test_extraction_failure_surfaces_typed_error() {
        let llm = ScriptedModel::new(&["deal", "not json"]);
        let pipeline = ExtractionPipeline::new(llm, PipelineConfig::default());
        let submission =
            RawSubmission::new("deck.txt", MediaType::PlainText, b"memo text".to_vec());
        let err = pipeline.process(&submission).await.unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }
}
