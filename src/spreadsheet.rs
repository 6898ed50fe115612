use log::{debug, info};

use crate::grid::{find_sheet, CellGrid, CellValue, SheetCategory};
use crate::schema::{ExtractionSource, FinancialMetrics, MetricReading};

/// Metric search terms, keyed by the canonical field name. Synonym lists
/// carry the label variations seen across sponsor models; longer terms are
/// matched before shorter ones so "unlevered irr" never hits the bare "irr"
/// pattern first.
const METRIC_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "levered_irr",
        &[
            "levered irr",
            "leveraged irr",
            "lp irr",
            "net irr",
            "irr to equity",
            "projected lp irr",
            "projected irr net",
            "irr",
        ],
    ),
    (
        "unlevered_irr",
        &[
            "unlevered irr",
            "unleveraged irr",
            "gross irr",
            "project level irr",
            "projected irr gross",
        ],
    ),
    (
        "equity_multiple",
        &[
            "equity multiple",
            "equity mult",
            "moic",
            "multiple on invested capital",
            "projected lp em",
            "net em",
            "multiple",
        ],
    ),
    (
        "equity_required",
        &[
            "equity required",
            "equity investment",
            "required equity",
            "lp equity",
            "total equity",
            "sponsor equity",
            "gp equity",
        ],
    ),
    (
        "total_project_cost",
        &[
            "total project cost",
            "total development cost",
            "total cost",
            "project cost",
            "total uses",
            "total investment",
        ],
    ),
    (
        "land_cost",
        &[
            "land cost",
            "purchase price",
            "acquisition price",
            "acquisition cost",
            "site cost",
            "land acquisition",
        ],
    ),
    (
        "hard_cost",
        &[
            "hard costs",
            "hard cost",
            "construction costs",
            "construction cost",
            "building cost",
            "renovation cost",
            "capex",
        ],
    ),
    (
        "soft_cost",
        &["soft costs", "soft cost", "closing costs", "transaction costs", "fees"],
    ),
    (
        "loan_amount",
        &["loan amount", "debt amount", "senior debt", "financing", "loan", "debt"],
    ),
    (
        "dscr_at_stabilization",
        &[
            "debt service coverage ratio",
            "stabilized dscr",
            "debt coverage",
            "dscr",
        ],
    ),
    (
        "exit_cap_rate",
        &[
            "exit cap rate",
            "terminal cap rate",
            "reversion cap rate",
            "going out cap",
            "exit cap",
            "terminal cap",
        ],
    ),
    (
        "yield_on_cost",
        &["yield on cost", "stabilized yoc", "stabilized yield", "yoc"],
    ),
    (
        "interest_rate",
        &["interest rate", "loan rate", "debt rate", "rate"],
    ),
    ("ltv", &["loan to value ratio", "loan to value", "loan-to-value", "ltv"]),
];

/// Labels a metric must NOT match even when one of its synonyms is a
/// substring: "Unlevered IRR" contains "levered irr", "Loan to Value"
/// contains "loan", and every cap-rate label contains "rate".
const METRIC_EXCLUSIONS: &[(&str, &[&str])] = &[
    ("levered_irr", &["unlevered", "unleveraged", "gross irr"]),
    ("loan_amount", &["loan to value", "loan-to-value", "loan rate"]),
    ("interest_rate", &["cap rate", "growth rate", "vacancy rate", "tax rate"]),
];

const HOLD_PERIOD_TERMS: &[&str] = &["hold period", "investment period", "hold"];

/// Cost-side fields often modeled as outflows; negatives are flipped.
const COST_FIELDS: &[&str] = &[
    "land_cost",
    "hard_cost",
    "soft_cost",
    "total_project_cost",
    "equity_required",
    "loan_amount",
];

const MAX_SCAN_ROWS: usize = 200;
const MAX_SCAN_COLS: usize = 20;
const MAX_RIGHT_OFFSET: usize = 5;

/// Extract named financial metrics from a set of acquired sheets.
///
/// Recognized sheets are searched in priority order (Returns, Sources & Uses,
/// Cash Flow, Overview); metrics still missing afterwards get one fallback
/// sweep over the remaining sheets. A metric with no located cell is simply
/// absent from the output, never defaulted.
pub fn extract_financials(sheets: &[CellGrid]) -> FinancialMetrics {
    let mut metrics = FinancialMetrics::new();

    let recognized: Vec<&CellGrid> = SheetCategory::ALL
        .iter()
        .filter_map(|category| find_sheet(sheets, *category))
        .collect();

    for grid in &recognized {
        collect_from_sheet(grid, &mut metrics);
    }

    let searched: Vec<&str> = recognized.iter().map(|g| g.name.as_str()).collect();
    let unsearched: Vec<&CellGrid> = sheets
        .iter()
        .filter(|g| !searched.contains(&g.name.as_str()))
        .collect();
    if metrics.len() < METRIC_SYNONYMS.len() {
        for grid in unsearched {
            collect_from_sheet(grid, &mut metrics);
        }
    }

    // Hold period gets its own pass: the unit lives in the label text, and
    // bare values under 20 read as years.
    if !metrics.contains_key("hold_period_months") {
        for grid in sheets {
            if let Some(reading) = find_hold_period(grid) {
                metrics.insert("hold_period_months".to_string(), reading);
                break;
            }
        }
    }

    for field in COST_FIELDS {
        if let Some(reading) = metrics.get_mut(*field) {
            if reading.value < 0.0 {
                reading.value = reading.value.abs();
                debug!("Flipped negative {} to {}", field, reading.value);
            }
        }
    }

    info!("Workbook analysis extracted {} metrics", metrics.len());
    metrics
}

fn collect_from_sheet(grid: &CellGrid, metrics: &mut FinancialMetrics) {
    for (name, terms) in METRIC_SYNONYMS {
        if metrics.contains_key(*name) {
            continue;
        }
        let excluded = METRIC_EXCLUSIONS
            .iter()
            .find(|(metric, _)| metric == name)
            .map(|(_, terms)| *terms)
            .unwrap_or(&[]);
        if let Some((value, provenance)) = locate_metric(grid, terms, excluded) {
            debug!("{} = {} from {}", name, value, provenance);
            metrics.insert(
                (*name).to_string(),
                MetricReading {
                    value,
                    confidence: assess_confidence(name, value),
                    provenance,
                    source: ExtractionSource::Spreadsheet,
                },
            );
        }
    }
}

/// Scan for a label cell containing one of the search terms, then take the
/// nearest non-zero value to its right (up to five columns) or directly
/// below it.
fn locate_metric(grid: &CellGrid, terms: &[&str], excluded: &[&str]) -> Option<(f64, String)> {
    for (row_idx, row) in grid.rows.iter().take(MAX_SCAN_ROWS).enumerate() {
        for (col_idx, cell) in row.iter().take(MAX_SCAN_COLS).enumerate() {
            let Some(label) = cell.as_text() else { continue };
            let label = label.to_lowercase();
            if !terms.iter().any(|term| label.contains(term)) {
                continue;
            }
            if excluded.iter().any(|term| label.contains(term)) {
                continue;
            }

            for offset in 1..=MAX_RIGHT_OFFSET {
                if let Some(value) = grid.cell(row_idx, col_idx + offset).and_then(parse_numeric) {
                    if value != 0.0 {
                        return Some((value, grid.cell_reference(row_idx, col_idx + offset)));
                    }
                }
            }
            if let Some(value) = grid.cell(row_idx + 1, col_idx).and_then(parse_numeric) {
                if value != 0.0 {
                    return Some((value, grid.cell_reference(row_idx + 1, col_idx)));
                }
            }
        }
    }
    None
}

fn find_hold_period(grid: &CellGrid) -> Option<MetricReading> {
    for (row_idx, row) in grid.rows.iter().take(MAX_SCAN_ROWS).enumerate() {
        for (col_idx, cell) in row.iter().take(MAX_SCAN_COLS).enumerate() {
            let Some(label) = cell.as_text() else { continue };
            let label = label.to_lowercase();
            if !HOLD_PERIOD_TERMS.iter().any(|term| label.contains(term)) {
                continue;
            }
            let Some(value) = grid.cell(row_idx, col_idx + 1).and_then(parse_numeric) else {
                continue;
            };

            let months = if label.contains("month") {
                value
            } else if label.contains("year") {
                value * 12.0
            } else if value < 20.0 {
                // Unlabeled small values are almost always years.
                value * 12.0
            } else {
                value
            };
            return Some(MetricReading {
                value: months,
                confidence: 0.85,
                provenance: grid.cell_reference(row_idx, col_idx + 1),
                source: ExtractionSource::Spreadsheet,
            });
        }
    }
    None
}

/// Parse a cell as a number, normalizing spreadsheet formatting:
/// `$1,685,348` → 1685348, `19.6%` → 0.196, `1.73x` → 1.73, `(123)` → -123.
pub fn parse_numeric(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => parse_numeric_text(s),
        _ => None,
    }
}

fn parse_numeric_text(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let is_percentage = trimmed.contains('%');
    let cleaned: String = trimmed
        .replace('$', "")
        .replace(',', "")
        .replace(' ', "")
        .replace('(', "-")
        .replace(')', "")
        .replace('%', "")
        .replace(['x', 'X'], "");

    let number: f64 = cleaned.parse().ok()?;

    // Values already stored as fractions (e.g. "0.196%") stay untouched.
    if is_percentage && number > 1.0 {
        Some(number / 100.0)
    } else {
        Some(number)
    }
}

/// Plausible readings score high; out-of-range ones are kept but flagged.
fn assess_confidence(metric: &str, value: f64) -> f64 {
    match metric {
        "levered_irr" | "unlevered_irr" => {
            if value > 0.0 && value < 1.0 {
                0.95
            } else {
                0.40
            }
        }
        "equity_multiple" => {
            if (0.5..=10.0).contains(&value) {
                0.95
            } else {
                0.40
            }
        }
        "dscr_at_stabilization" => {
            if (0.5..5.0).contains(&value) {
                0.90
            } else {
                0.40
            }
        }
        _ => 0.85,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_percentage_normalization() {
        assert_eq!(parse_numeric(&text("19.6%")), Some(0.196));
        assert_eq!(parse_numeric(&text("0%")), Some(0.0));
        assert_eq!(parse_numeric(&text("100%")), Some(1.0));
        // Already a fraction, no double conversion.
        assert_eq!(parse_numeric(&text("0.196%")), Some(0.196));
    }

    #[test]
    fn test_currency_normalization() {
        assert_eq!(parse_numeric(&text("$1,685,348")), Some(1_685_348.0));
        assert_eq!(parse_numeric(&text("$ 12,500")), Some(12_500.0));
    }

    #[test]
    fn test_multiplier_and_negative_formats() {
        assert_eq!(parse_numeric(&text("1.73x")), Some(1.73));
        assert_eq!(parse_numeric(&text("(123)")), Some(-123.0));
        assert_eq!(parse_numeric(&text("not a number")), None);
    }

    fn returns_sheet() -> CellGrid {
        let mut rows = vec![vec![CellValue::Empty; 4]; 6];
        rows[4][0] = text("IRR");
        rows[4][1] = text("19.6%");
        rows[5][0] = text("Equity Multiple");
        rows[5][1] = text("1.73x");
        CellGrid::new("Returns", rows)
    }

    #[test]
    fn test_irr_extracted_with_cell_provenance() {
        let metrics = extract_financials(&[returns_sheet()]);
        let irr = &metrics["levered_irr"];
        assert!((irr.value - 0.196).abs() < 1e-9);
        assert_eq!(irr.provenance, "Returns!B5");
        assert_eq!(irr.source, ExtractionSource::Spreadsheet);
        assert!(irr.confidence > 0.9);
    }

    #[test]
    fn test_value_below_label_is_found() {
        let mut rows = vec![vec![CellValue::Empty; 2]; 3];
        rows[0][0] = text("Total Project Cost");
        rows[1][0] = text("$4,200,000");
        let metrics = extract_financials(&[CellGrid::new("Sources & Uses", rows)]);
        assert_eq!(metrics["total_project_cost"].value, 4_200_000.0);
        assert_eq!(metrics["total_project_cost"].provenance, "Sources & Uses!A2");
    }

    #[test]
    fn test_missing_metric_is_absent_not_zero() {
        let metrics = extract_financials(&[returns_sheet()]);
        assert!(!metrics.contains_key("loan_amount"));
        assert!(!metrics.contains_key("exit_cap_rate"));
    }

    #[test]
    fn test_out_of_range_values_flagged_not_dropped() {
        let mut rows = vec![vec![CellValue::Empty; 2]; 2];
        rows[0][0] = text("Levered IRR");
        rows[0][1] = CellValue::Number(1.45); // 145%: kept, low confidence
        rows[1][0] = text("Equity Multiple");
        rows[1][1] = CellValue::Number(14.0); // outside [0.5, 10]
        let metrics = extract_financials(&[CellGrid::new("Returns", rows)]);
        assert_eq!(metrics["levered_irr"].value, 1.45);
        assert!(metrics["levered_irr"].confidence < 0.5);
        assert_eq!(metrics["equity_multiple"].value, 14.0);
        assert!(metrics["equity_multiple"].confidence < 0.5);
    }

    #[test]
    fn test_negative_costs_flipped_positive() {
        let mut rows = vec![vec![CellValue::Empty; 2]; 1];
        rows[0][0] = text("Equity Required");
        rows[0][1] = text("(2,500,000)");
        let metrics = extract_financials(&[CellGrid::new("Sources and Uses", rows)]);
        assert_eq!(metrics["equity_required"].value, 2_500_000.0);
    }

    #[test]
    fn test_hold_period_years_converted_to_months() {
        let mut rows = vec![vec![CellValue::Empty; 2]; 1];
        rows[0][0] = text("Hold Period");
        rows[0][1] = CellValue::Number(5.0);
        let metrics = extract_financials(&[CellGrid::new("Overview", rows)]);
        assert_eq!(metrics["hold_period_months"].value, 60.0);
    }

    #[test]
    fn test_fallback_sweep_covers_unrecognized_sheets() {
        let mut rows = vec![vec![CellValue::Empty; 2]; 1];
        rows[0][0] = text("Loan Amount");
        rows[0][1] = text("$3,100,000");
        // Sheet name matches no canonical category.
        let metrics = extract_financials(&[CellGrid::new("Debt Detail", rows)]);
        assert_eq!(metrics["loan_amount"].value, 3_100_000.0);
    }

    #[test]
    fn test_unlevered_label_never_hits_levered_irr() {
        let mut rows = vec![vec![CellValue::Empty; 2]; 1];
        rows[0][0] = text("Unlevered IRR");
        rows[0][1] = text("14.2%");
        let metrics = extract_financials(&[CellGrid::new("Returns", rows)]);
        assert!((metrics["unlevered_irr"].value - 0.142).abs() < 1e-9);
        assert!(!metrics.contains_key("levered_irr"));
    }

    #[test]
    fn test_ltv_label_never_hits_loan_amount() {
        let mut rows = vec![vec![CellValue::Empty; 2]; 1];
        rows[0][0] = text("Loan to Value");
        rows[0][1] = text("65%");
        let metrics = extract_financials(&[CellGrid::new("Returns", rows)]);
        assert!((metrics["ltv"].value - 0.65).abs() < 1e-9);
        assert!(!metrics.contains_key("loan_amount"));
    }
}
