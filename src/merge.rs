use log::info;
use serde::{Deserialize, Serialize};

use crate::schema::{
    CaseNarrative, Classification, EntityBlock, ExtractionResult, FinancialMetrics,
    PrincipalProfile,
};

/// Which source won a top-level block in a merged extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Narrative,
    Financial,
    /// The financial source contributed nothing; no financial override was
    /// applied and the block carries the narrative source's metrics.
    NarrativeOnly,
}

/// Result of combining a narrative-source and a financial-source extraction
/// for the same logical submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedExtraction {
    pub entity: Option<EntityBlock>,
    pub secondary_entities: Vec<EntityBlock>,
    pub narrative: Option<CaseNarrative>,
    pub principals: Vec<PrincipalProfile>,
    pub financials: FinancialMetrics,
    pub classification: Classification,
    pub entity_source: SourceTag,
    pub financial_source: SourceTag,
}

/// Combine an explicitly linked pair. Entity identity, deal/fund narrative,
/// and principals always come from the narrative source; every metric
/// present in the financial source overrides the same-named narrative
/// metric. An empty financial source degrades the merge to narrative-only:
/// a lower-confidence result, not an error.
pub fn merge(narrative: &ExtractionResult, financial: &ExtractionResult) -> MergedExtraction {
    let mut financials = narrative.financials.clone();
    let financial_source = if financial.financials.is_empty() {
        info!("Financial source contributed no metrics; no financial override applied");
        SourceTag::NarrativeOnly
    } else {
        for (name, reading) in &financial.financials {
            financials.insert(name.clone(), reading.clone());
        }
        SourceTag::Financial
    };

    MergedExtraction {
        entity: narrative.entity.clone(),
        secondary_entities: narrative.secondary_entities.clone(),
        narrative: narrative.narrative.clone(),
        principals: narrative.principals.clone(),
        financials,
        classification: narrative.classification,
        entity_source: SourceTag::Narrative,
        financial_source,
    }
}

impl MergedExtraction {
    /// Lift a lone extraction into the merged shape, for submissions that
    /// never had a financial-model sibling.
    pub fn from_single(extraction: &ExtractionResult) -> MergedExtraction {
        MergedExtraction {
            entity: extraction.entity.clone(),
            secondary_entities: extraction.secondary_entities.clone(),
            narrative: extraction.narrative.clone(),
            principals: extraction.principals.clone(),
            financials: extraction.financials.clone(),
            classification: extraction.classification,
            entity_source: SourceTag::Narrative,
            financial_source: SourceTag::NarrativeOnly,
        }
    }
}
