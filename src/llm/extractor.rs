use std::sync::Arc;

use log::info;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::llm::prompts::{deal_extraction_prompt, fund_extraction_prompt, truncate_text};
use crate::llm::{clean_json_reply, CompletionRequest, LanguageModel};
use crate::schema::{Classification, DealExtraction, ExtractionResult, FundExtraction};

/// Pulls entity, narrative, and financial blocks out of unstructured
/// document text with a schema-constrained model call. The sponsor name is
/// nullable in the schema; documents that never identify one still extract.
pub struct NarrativeExtractor {
    llm: Arc<dyn LanguageModel>,
    text_budget: usize,
}

impl NarrativeExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, config: &PipelineConfig) -> Self {
        Self {
            llm,
            text_budget: config.text_budget,
        }
    }

    pub async fn extract(
        &self,
        document_text: &str,
        classification: Classification,
    ) -> Result<ExtractionResult> {
        let text = truncate_text(document_text, self.text_budget);
        info!(
            "Requesting {} extraction over {} characters",
            classification,
            text.len()
        );

        let (prompt, schema_name) = match classification {
            Classification::Deal => {
                let schema = schema_json::<DealExtraction>()?;
                (deal_extraction_prompt(&text, &schema), "deal")
            }
            Classification::Fund => {
                let schema = schema_json::<FundExtraction>()?;
                (fund_extraction_prompt(&text, &schema), "fund")
            }
        };

        let reply = self.llm.complete(CompletionRequest::new(prompt)).await?;
        let cleaned = clean_json_reply(&reply);

        let result = match classification {
            Classification::Deal => serde_json::from_str::<DealExtraction>(&cleaned)
                .map_err(|e| mismatch(schema_name, e))?
                .into_result(),
            Classification::Fund => serde_json::from_str::<FundExtraction>(&cleaned)
                .map_err(|e| mismatch(schema_name, e))?
                .into_result(),
        };

        info!(
            "Extraction produced {} metrics, {} principals, entity: {}",
            result.financials.len(),
            result.principals.len(),
            result
                .entity
                .as_ref()
                .map(|e| e.name.as_str())
                .unwrap_or("<none>")
        );
        Ok(result)
    }
}

fn schema_json<T: schemars::JsonSchema>() -> Result<String> {
    let schema = schemars::schema_for!(T);
    Ok(serde_json::to_string_pretty(&schema)?)
}

fn mismatch(schema: &str, e: serde_json::Error) -> PipelineError {
    PipelineError::SchemaMismatch {
        schema: schema.to_string(),
        details: e.to_string(),
    }
}
