use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::llm::prompts::insight_prompt;
use crate::llm::{CompletionRequest, LanguageModel};

/// Lifecycle position of a case, which decides the insight section set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStage {
    /// Still being evaluated: thesis, risks, and diligence questions.
    PreDecision,
    /// In the portfolio: execution tracking rather than evaluation.
    Committed,
}

impl CaseStage {
    /// Headings consumers locate sections by, in output order.
    pub fn section_headings(&self) -> &'static [&'static str] {
        match self {
            CaseStage::PreDecision => &["Investment Thesis", "Key Risks", "Open Questions"],
            CaseStage::Committed => &[
                "Execution Status",
                "Current Risks & Concerns",
                "Action Items & Follow-Ups",
            ],
        }
    }
}

/// The case's full current record as insight generation sees it. Fields the
/// pipeline never populated stay None and are reported to the model as
/// missing rather than silently dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseRecord {
    pub deal_name: String,
    pub sponsor_name: Option<String>,
    pub strategy_type: Option<String>,
    pub asset_type: Option<String>,
    pub market: Option<String>,
    pub address: Option<String>,
    pub num_units: Option<u32>,
    pub building_sf: Option<f64>,
    pub year_built: Option<i32>,
    pub business_plan_summary: Option<String>,
    pub hold_period_years: Option<f64>,
    pub total_project_cost: Option<f64>,
    pub land_cost: Option<f64>,
    pub hard_cost: Option<f64>,
    pub soft_cost: Option<f64>,
    pub equity_required: Option<f64>,
    pub loan_amount: Option<f64>,
    pub ltv: Option<f64>,
    pub levered_irr: Option<f64>,
    pub equity_multiple: Option<f64>,
    pub exit_cap_rate: Option<f64>,
    pub dscr_at_stabilization: Option<f64>,
    pub yield_on_cost: Option<f64>,
}

/// One entry in the case's document/transcript history, ordered
/// chronologically by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDocument {
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub text: Option<String>,
}

/// One parsed section of an insight document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSection {
    pub heading: String,
    pub body: String,
}

/// Structured narrative output keyed to one case. Regenerable: replaced
/// wholesale, never patched section by section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightDocument {
    pub case_id: Uuid,
    pub title: String,
    pub markdown: String,
    pub sections: Vec<InsightSection>,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
}

/// Persistence seam for insight documents. `replace` is the only write:
/// the previous document for the case is deleted in full and the new one
/// stored as a single operation, so readers never observe a partial
/// overwrite.
pub trait InsightStore {
    fn replace(&mut self, document: InsightDocument);
    fn current(&self, case_id: Uuid) -> Option<InsightDocument>;
}

/// Reference in-memory store, also the test fixture.
#[derive(Debug, Default)]
pub struct InMemoryInsightStore {
    documents: HashMap<Uuid, InsightDocument>,
}

impl InMemoryInsightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

impl InsightStore for InMemoryInsightStore {
    fn replace(&mut self, document: InsightDocument) {
        self.documents.insert(document.case_id, document);
    }

    fn current(&self, case_id: Uuid) -> Option<InsightDocument> {
        self.documents.get(&case_id).cloned()
    }
}

/// Synthesizes stored case data plus document history into a sectioned
/// markdown memo. Failures here never block the case itself; the caller
/// logs and retries on demand.
pub struct InsightGenerator {
    llm: Arc<dyn LanguageModel>,
    model_label: String,
    excerpt_budget: usize,
}

impl InsightGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>, config: &PipelineConfig) -> Self {
        Self {
            llm,
            model_label: config.model.clone(),
            excerpt_budget: config.insight_excerpt_budget,
        }
    }

    pub async fn generate(
        &self,
        case_id: Uuid,
        record: &CaseRecord,
        history: &[CaseDocument],
        stage: CaseStage,
    ) -> Result<InsightDocument> {
        let context = build_context_block(record, history.len());
        let excerpt = latest_excerpt(history, self.excerpt_budget);
        info!(
            "Generating {:?} insight for case {} from {} documents",
            stage,
            case_id,
            history.len()
        );

        let request = CompletionRequest::new(insight_prompt(&context, &excerpt, stage))
            .with_temperature(0.3);
        let markdown = self.llm.complete(request).await?;

        let sections = parse_sections(&markdown, stage.section_headings());
        let empty = sections.iter().filter(|s| s.body.is_empty()).count();
        if empty > 0 {
            warn!("{} expected section(s) absent from generated memo", empty);
        }

        Ok(InsightDocument {
            case_id,
            title: format!("Investment Memo - {}", record.deal_name),
            markdown,
            sections,
            generated_by: self.model_label.clone(),
            generated_at: Utc::now(),
        })
    }
}

/// Trigger-and-replace entry point: generation happens first, and the prior
/// document is only removed as part of storing the new one, so there is
/// never a visible gap or a partially overwritten memo.
pub async fn regenerate_insight(
    generator: &InsightGenerator,
    store: &mut dyn InsightStore,
    case_id: Uuid,
    record: &CaseRecord,
    history: &[CaseDocument],
    stage: CaseStage,
) -> Result<InsightDocument> {
    let document = generator.generate(case_id, record, history, stage).await?;
    store.replace(document.clone());
    Ok(document)
}

pub fn fmt_currency(value: Option<f64>) -> String {
    match value {
        None => "Not provided".to_string(),
        Some(v) if v >= 1_000_000.0 => format!("${:.1}M", v / 1_000_000.0),
        Some(v) if v >= 1_000.0 => format!("${:.0}K", v / 1_000.0),
        Some(v) => format!("${:.0}", v),
    }
}

pub fn fmt_pct(value: Option<f64>) -> String {
    match value {
        None => "Not provided".to_string(),
        Some(v) => format!("{:.1}%", v * 100.0),
    }
}

pub fn fmt_mult(value: Option<f64>) -> String {
    match value {
        None => "Not provided".to_string(),
        Some(v) => format!("{:.2}x", v),
    }
}

fn fmt_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "Not provided".to_string())
}

fn build_context_block(record: &CaseRecord, document_count: usize) -> String {
    let missing = missing_fields(record);
    format!(
        "Deal Name: {}\n\
         Strategy: {}\n\
         Asset Type: {}\n\
         Market: {}\n\
         Sponsor: {}\n\n\
         Property Details:\n\
         - Units: {}\n\
         - Square Feet: {}\n\
         - Year Built: {}\n\
         - Location: {}\n\n\
         Business Plan Summary:\n{}\n\n\
         Underwriting Metrics:\n\
         - Total Project Cost: {}\n\
         - Land/Acquisition Cost: {}\n\
         - Hard Costs: {}\n\
         - Soft Costs: {}\n\
         - Equity Required: {}\n\
         - Loan Amount: {}\n\
         - LTV: {}\n\
         - Levered IRR (Projected): {}\n\
         - Equity Multiple (Projected): {}\n\
         - Exit Cap Rate (Assumed): {}\n\
         - DSCR at Stabilization (Projected): {}\n\
         - Yield on Cost: {}\n\
         - Hold Period: {} years\n\n\
         Missing Data Points: {}\n\
         Document Count: {}",
        record.deal_name,
        fmt_opt(&record.strategy_type),
        fmt_opt(&record.asset_type),
        fmt_opt(&record.market),
        record.sponsor_name.as_deref().unwrap_or("Unknown Sponsor"),
        fmt_opt(&record.num_units),
        fmt_opt(&record.building_sf),
        fmt_opt(&record.year_built),
        fmt_opt(&record.address),
        record.business_plan_summary.as_deref().unwrap_or("Not provided"),
        fmt_currency(record.total_project_cost),
        fmt_currency(record.land_cost),
        fmt_currency(record.hard_cost),
        fmt_currency(record.soft_cost),
        fmt_currency(record.equity_required),
        fmt_currency(record.loan_amount),
        fmt_pct(record.ltv),
        fmt_pct(record.levered_irr),
        fmt_mult(record.equity_multiple),
        fmt_pct(record.exit_cap_rate),
        fmt_opt(&record.dscr_at_stabilization),
        fmt_pct(record.yield_on_cost),
        fmt_opt(&record.hold_period_years),
        if missing.is_empty() {
            "None".to_string()
        } else {
            missing.join(", ")
        },
        document_count,
    )
}

fn missing_fields(record: &CaseRecord) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if record.hard_cost.is_none() {
        missing.push("hard_cost");
    }
    if record.exit_cap_rate.is_none() {
        missing.push("exit_cap_rate");
    }
    if record.yield_on_cost.is_none() {
        missing.push("yield_on_cost");
    }
    if record.dscr_at_stabilization.is_none() {
        missing.push("dscr_at_stabilization");
    }
    missing
}

fn latest_excerpt(history: &[CaseDocument], budget: usize) -> String {
    history
        .last()
        .and_then(|doc| doc.text.as_deref())
        .map(|text| {
            let mut cut = text.len().min(budget);
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text[..cut].to_string()
        })
        .unwrap_or_else(|| "No recent update available".to_string())
}

/// Split generated markdown into the expected sections, located purely by
/// `## <heading>` text match. An absent heading yields an empty section, not
/// an error, since heading text is the whole parsing contract.
pub fn parse_sections(markdown: &str, headings: &[&str]) -> Vec<InsightSection> {
    headings
        .iter()
        .map(|heading| {
            let marker = format!("## {}", heading);
            let body = markdown
                .find(&marker)
                .map(|start| {
                    let after = start + marker.len();
                    let rest = &markdown[after..];
                    let end = rest.find("\n## ").unwrap_or(rest.len());
                    rest[..end].trim().to_string()
                })
                .unwrap_or_default();
            InsightSection {
                heading: (*heading).to_string(),
                body,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn test_currency_formatting() {
        assert_eq!(fmt_currency(Some(4_200_000.0)), "$4.2M");
        assert_eq!(fmt_currency(Some(12_600.0)), "$13K");
        assert_eq!(fmt_currency(Some(950.0)), "$950");
        assert_eq!(fmt_currency(None), "Not provided");
    }

    #[test]
    fn test_pct_and_mult_formatting() {
        assert_eq!(fmt_pct(Some(0.196)), "19.6%");
        assert_eq!(fmt_mult(Some(1.733)), "1.73x");
        assert_eq!(fmt_pct(None), "Not provided");
    }

    #[test]
    fn test_parse_sections_by_heading() {
        let markdown = "## Investment Thesis\n- point one\n\n## Key Risks\n- risk one\n\n## Open Questions\n- q1";
        let sections = parse_sections(markdown, CaseStage::PreDecision.section_headings());
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].body, "- point one");
        assert_eq!(sections[1].heading, "Key Risks");
        assert_eq!(sections[2].body, "- q1");
    }

    #[test]
    fn test_absent_heading_is_empty_section_not_error() {
        let markdown = "## Investment Thesis\n- only thesis came back";
        let sections = parse_sections(markdown, CaseStage::PreDecision.section_headings());
        assert_eq!(sections.len(), 3);
        assert!(!sections[0].body.is_empty());
        assert!(sections[1].body.is_empty());
        assert!(sections[2].body.is_empty());
    }

    struct CannedModel {
        reply: String,
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            // Memo generation runs slightly creative, unlike extraction.
            assert!(request.temperature > 0.0);
            Ok(self.reply.clone())
        }
    }

    fn generator(reply: &str) -> InsightGenerator {
        InsightGenerator::new(
            Arc::new(CannedModel {
                reply: reply.to_string(),
            }),
            &PipelineConfig::default(),
        )
    }

    fn record() -> CaseRecord {
        CaseRecord {
            deal_name: "Springdale Commons".to_string(),
            levered_irr: Some(0.196),
            ..CaseRecord::default()
        }
    }

    const PRE_DECISION_MEMO: &str =
        "## Investment Thesis\n- **Below-market rents** support upside\n\n## Key Risks\n- **Leverage**: 65% LTV\n\n## Open Questions\n- Verify the rent roll";

    #[tokio::test]
    async fn test_regeneration_replaces_prior_document_wholesale() {
        let generator = generator(PRE_DECISION_MEMO);
        let mut store = InMemoryInsightStore::new();
        let case_id = Uuid::new_v4();

        let first = regenerate_insight(
            &generator,
            &mut store,
            case_id,
            &record(),
            &[],
            CaseStage::PreDecision,
        )
        .await
        .unwrap();

        let second = regenerate_insight(
            &generator,
            &mut store,
            case_id,
            &record(),
            &[],
            CaseStage::PreDecision,
        )
        .await
        .unwrap();

        // Exactly one document remains and it is the newest one.
        assert_eq!(store.document_count(), 1);
        let current = store.current(case_id).unwrap();
        assert_eq!(current.generated_at, second.generated_at);
        assert!(current.generated_at >= first.generated_at);
        assert_eq!(current.sections.len(), 3);
        assert_eq!(current.sections[0].heading, "Investment Thesis");
    }

    #[tokio::test]
    async fn test_committed_stage_parses_execution_sections() {
        let memo = "## Execution Status\n- **Construction** 60% complete\n\n## Current Risks & Concerns\n- **Costs** trending over\n\n## Action Items & Follow-Ups\n- Request updated budget";
        let generator = generator(memo);
        let document = generator
            .generate(Uuid::new_v4(), &record(), &[], CaseStage::Committed)
            .await
            .unwrap();
        assert_eq!(document.sections[0].heading, "Execution Status");
        assert!(document.sections[2].body.contains("Request updated budget"));
    }
}
