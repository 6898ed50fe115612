use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether a document describes one specific property deal or a fund /
/// strategy thesis. Drives which extraction schema is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Deal,
    Fund,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Deal => write!(f, "deal"),
            Classification::Fund => write!(f, "fund"),
        }
    }
}

/// Which extractor produced a result or an individual metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// Unstructured document text run through the language model.
    Narrative,
    /// Cell-level readings from a financial model workbook.
    Spreadsheet,
}

/// One named financial metric with its confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub value: f64,
    /// 0.0 to 1.0; out-of-range readings are kept but flagged low.
    pub confidence: f64,
    /// `"<sheet>!<cell>"` for spreadsheet readings, `"narrative"` otherwise.
    pub provenance: String,
    pub source: ExtractionSource,
}

pub type FinancialMetrics = BTreeMap<String, MetricReading>;

/// Sponsor/operator firm fields the narrative extractor pulls from a
/// document. The name is deliberately nullable: many teasers and strategy
/// decks never identify the sponsor, and downstream resolution handles that
/// with a placeholder rather than rejecting the document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OperatorProfile {
    #[schemars(description = "Company/operator name, or null if the document never identifies the sponsor")]
    pub name: Option<String>,

    #[schemars(description = "Legal entity name if different from the brand name")]
    pub legal_name: Option<String>,

    #[schemars(description = "Website URL")]
    pub website_url: Option<String>,

    #[schemars(description = "Headquarters city")]
    pub hq_city: Option<String>,

    #[schemars(description = "Headquarters state")]
    pub hq_state: Option<String>,

    #[schemars(description = "Headquarters country")]
    pub hq_country: Option<String>,

    #[schemars(description = "Primary geographic focus area")]
    pub primary_geography_focus: Option<String>,

    #[schemars(description = "Primary asset type focus, e.g. Multifamily, Industrial")]
    pub primary_asset_type_focus: Option<String>,

    #[schemars(description = "Brief description of the operator")]
    pub description: Option<String>,
}

/// A named individual at the sponsor.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrincipalProfile {
    #[schemars(description = "Full name")]
    pub full_name: String,

    #[schemars(description = "Title or role")]
    pub headline: Option<String>,

    #[schemars(description = "LinkedIn URL")]
    pub linkedin_url: Option<String>,

    #[schemars(description = "Email address")]
    pub email: Option<String>,

    #[schemars(description = "Phone number")]
    pub phone: Option<String>,

    #[schemars(description = "Brief background summary")]
    pub background_summary: Option<String>,

    #[schemars(description = "Years of relevant experience")]
    pub years_experience: Option<u32>,
}

/// Property-level narrative fields for a specific deal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DealProfile {
    #[schemars(description = "Name of this specific deal/property; use the actual property or portfolio name, not a generic term")]
    pub deal_name: Option<String>,

    #[schemars(description = "Internal reference code; derive one from the deal name (e.g. SPRINGDALE-001) when not stated")]
    pub internal_code: Option<String>,

    #[schemars(description = "Country where the property is located")]
    pub country: Option<String>,

    #[schemars(description = "State where the property is located")]
    pub state: Option<String>,

    #[schemars(description = "Metropolitan Statistical Area")]
    pub msa: Option<String>,

    #[schemars(description = "Submarket name")]
    pub submarket: Option<String>,

    #[schemars(description = "Street address")]
    pub address_line1: Option<String>,

    #[schemars(description = "Zip/postal code")]
    pub postal_code: Option<String>,

    #[schemars(description = "Asset type: Multifamily, Office, Retail, Industrial, etc.")]
    pub asset_type: Option<String>,

    #[schemars(description = "Investment strategy: Value-Add, Core, Core-Plus, Opportunistic, Development, etc.")]
    pub strategy_type: Option<String>,

    #[schemars(description = "Number of units")]
    pub num_units: Option<u32>,

    #[schemars(description = "Building square footage")]
    pub building_sf: Option<f64>,

    #[schemars(description = "Year built")]
    pub year_built: Option<i32>,

    #[schemars(description = "Brief summary of the business plan")]
    pub business_plan_summary: Option<String>,

    #[schemars(description = "Expected hold period in years")]
    pub hold_period_years: Option<u32>,
}

/// Strategy-level narrative fields for a fund or programmatic vehicle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FundProfile {
    #[schemars(description = "Name of the fund or investment vehicle")]
    pub fund_name: Option<String>,

    #[schemars(description = "Target fund size in dollars")]
    pub target_fund_size: Option<f64>,

    #[schemars(description = "Summary of the investment thesis and strategy")]
    pub strategy_summary: Option<String>,

    #[schemars(description = "Target geographic focus")]
    pub geographic_focus: Option<String>,

    #[schemars(description = "Target asset types")]
    pub asset_type_focus: Option<String>,

    #[schemars(description = "Management fee as a decimal fraction, e.g. 0.02 for 2%")]
    pub management_fee: Option<f64>,

    #[schemars(description = "Carried interest as a decimal fraction, e.g. 0.20 for 20%")]
    pub carried_interest: Option<f64>,

    #[schemars(description = "Minimum GP commitment as a decimal fraction of fund size")]
    pub gp_commitment: Option<f64>,
}

/// Financial figures the narrative extractor reads out of document prose and
/// tables. Percentages are decimal fractions (0.2511 for 25.11%); absent
/// figures stay null, never zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct UnderwritingFigures {
    #[schemars(description = "Purchase price")]
    pub purchase_price: Option<f64>,

    #[schemars(description = "Renovation/CapEx budget")]
    pub renovation_budget: Option<f64>,

    #[schemars(description = "Total project cost")]
    pub total_project_cost: Option<f64>,

    #[schemars(description = "Loan amount")]
    pub loan_amount: Option<f64>,

    #[schemars(description = "Equity required")]
    pub equity_required: Option<f64>,

    #[schemars(description = "Levered IRR as a decimal fraction, e.g. 0.2511 for 25.11%")]
    pub levered_irr: Option<f64>,

    #[schemars(description = "Unlevered IRR as a decimal fraction")]
    pub unlevered_irr: Option<f64>,

    #[schemars(description = "Equity multiple, e.g. 2.21")]
    pub equity_multiple: Option<f64>,

    #[schemars(description = "Average cash-on-cash return as a decimal fraction")]
    pub average_cash_on_cash: Option<f64>,

    #[schemars(description = "Hold period in months")]
    pub hold_period_months: Option<f64>,

    #[schemars(description = "Entry cap rate as a decimal fraction")]
    pub entry_cap_rate: Option<f64>,

    #[schemars(description = "Exit cap rate as a decimal fraction")]
    pub exit_cap_rate: Option<f64>,
}

/// Wire shape requested from the language model for a deal document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DealExtraction {
    #[schemars(description = "All sponsor/operator firms named in the document, most prominent first; empty when no sponsor is identified")]
    pub sponsors: Vec<OperatorProfile>,

    pub deal: DealProfile,

    #[schemars(description = "All principals mentioned in the document, especially from team and contact pages")]
    pub principals: Vec<PrincipalProfile>,

    pub underwriting: UnderwritingFigures,
}

/// Wire shape requested from the language model for a fund/strategy document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FundExtraction {
    #[schemars(description = "All sponsor/GP firms named in the document, most prominent first; empty when no sponsor is identified")]
    pub sponsors: Vec<OperatorProfile>,

    pub fund: FundProfile,

    #[schemars(description = "All principals mentioned in the document")]
    pub principals: Vec<PrincipalProfile>,

    pub underwriting: UnderwritingFigures,
}

/// Resolved operator identity fields carried on an extraction result. Unlike
/// [`OperatorProfile`], the name here is required: profiles without a name
/// collapse to a null entity block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityBlock {
    pub name: String,
    pub legal_name: Option<String>,
    pub website_url: Option<String>,
    pub hq_city: Option<String>,
    pub hq_state: Option<String>,
    pub hq_country: Option<String>,
    pub primary_geography_focus: Option<String>,
    pub primary_asset_type_focus: Option<String>,
    pub description: Option<String>,
}

impl EntityBlock {
    fn from_profile(profile: OperatorProfile) -> Option<EntityBlock> {
        let name = profile.name.as_deref().map(str::trim).unwrap_or("");
        if name.is_empty() {
            return None;
        }
        Some(EntityBlock {
            name: name.to_string(),
            legal_name: profile.legal_name,
            website_url: profile.website_url,
            hq_city: profile.hq_city,
            hq_state: profile.hq_state,
            hq_country: profile.hq_country,
            primary_geography_focus: profile.primary_geography_focus,
            primary_asset_type_focus: profile.primary_asset_type_focus,
            description: profile.description,
        })
    }
}

/// Narrative block of an extraction result, shaped by classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CaseNarrative {
    Deal(DealProfile),
    Fund(FundProfile),
}

/// Normalized output of running one artifact through acquisition and
/// extraction. Ephemeral: consumed immediately by merge/resolution, never
/// independently persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Primary sponsor, or null when the document never names one.
    pub entity: Option<EntityBlock>,
    /// Additional sponsors named in the same document, linked as secondary.
    pub secondary_entities: Vec<EntityBlock>,
    pub narrative: Option<CaseNarrative>,
    pub principals: Vec<PrincipalProfile>,
    pub financials: FinancialMetrics,
    pub classification: Classification,
    pub source: ExtractionSource,
}

impl ExtractionResult {
    /// Result for the spreadsheet path: metrics only, no narrative. Financial
    /// models always describe a specific deal.
    pub fn from_financials(financials: FinancialMetrics) -> Self {
        ExtractionResult {
            entity: None,
            secondary_entities: Vec::new(),
            narrative: None,
            principals: Vec::new(),
            financials,
            classification: Classification::Deal,
            source: ExtractionSource::Spreadsheet,
        }
    }
}

const NARRATIVE_METRIC_CONFIDENCE: f64 = 0.70;

fn narrative_reading(value: f64) -> MetricReading {
    MetricReading {
        value,
        confidence: NARRATIVE_METRIC_CONFIDENCE,
        provenance: "narrative".to_string(),
        source: ExtractionSource::Narrative,
    }
}

fn figures_to_metrics(figures: UnderwritingFigures) -> FinancialMetrics {
    let mut metrics = FinancialMetrics::new();
    let pairs = [
        ("purchase_price", figures.purchase_price),
        ("renovation_budget", figures.renovation_budget),
        ("total_project_cost", figures.total_project_cost),
        ("loan_amount", figures.loan_amount),
        ("equity_required", figures.equity_required),
        ("levered_irr", figures.levered_irr),
        ("unlevered_irr", figures.unlevered_irr),
        ("equity_multiple", figures.equity_multiple),
        ("average_cash_on_cash", figures.average_cash_on_cash),
        ("hold_period_months", figures.hold_period_months),
        ("entry_cap_rate", figures.entry_cap_rate),
        ("exit_cap_rate", figures.exit_cap_rate),
    ];
    for (name, value) in pairs {
        if let Some(value) = value {
            metrics.insert(name.to_string(), narrative_reading(value));
        }
    }
    metrics
}

fn split_sponsors(sponsors: Vec<OperatorProfile>) -> (Option<EntityBlock>, Vec<EntityBlock>) {
    let mut named = sponsors.into_iter().filter_map(EntityBlock::from_profile);
    let primary = named.next();
    (primary, named.collect())
}

impl DealExtraction {
    pub fn into_result(self) -> ExtractionResult {
        let (entity, secondary_entities) = split_sponsors(self.sponsors);
        ExtractionResult {
            entity,
            secondary_entities,
            narrative: Some(CaseNarrative::Deal(self.deal)),
            principals: self.principals,
            financials: figures_to_metrics(self.underwriting),
            classification: Classification::Deal,
            source: ExtractionSource::Narrative,
        }
    }
}

impl FundExtraction {
    pub fn into_result(self) -> ExtractionResult {
        let (entity, secondary_entities) = split_sponsors(self.sponsors);
        ExtractionResult {
            entity,
            secondary_entities,
            narrative: Some(CaseNarrative::Fund(self.fund)),
            principals: self.principals,
            financials: figures_to_metrics(self.underwriting),
            classification: Classification::Fund,
            source: ExtractionSource::Narrative,
        }
    }
}
