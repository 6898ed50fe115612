use serde::{Deserialize, Serialize};

/// A single spreadsheet cell after acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One named sheet rendered as a labeled 2-D grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellGrid {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl CellGrid {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Standard A1-style reference for a 0-based (row, col) position,
    /// prefixed with the sheet name: `Returns!B5`.
    pub fn cell_reference(&self, row: usize, col: usize) -> String {
        format!("{}!{}{}", self.name, column_letters(col), row + 1)
    }
}

fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Canonical sheet categories, in priority order for metric search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetCategory {
    Returns,
    SourcesUses,
    CashFlow,
    Overview,
}

impl SheetCategory {
    pub const ALL: [SheetCategory; 4] = [
        SheetCategory::Returns,
        SheetCategory::SourcesUses,
        SheetCategory::CashFlow,
        SheetCategory::Overview,
    ];

    /// Known name variations, exact match preferred but any serves as a
    /// fuzzy target.
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            SheetCategory::Returns => &[
                "returns",
                "investment returns",
                "inv returns",
                "return",
                "investor returns",
            ],
            SheetCategory::SourcesUses => &[
                "sources & uses",
                "sources and uses",
                "s&u",
                "s & u",
                "sources uses",
                "sources/uses",
            ],
            SheetCategory::CashFlow => &[
                "cash flow",
                "cashflow",
                "proforma",
                "pro forma",
                "cash flows",
                "projections",
            ],
            SheetCategory::Overview => &[
                "overview",
                "summary",
                "executive summary",
                "deal summary",
                "investment summary",
            ],
        }
    }
}

const SHEET_NAME_SIMILARITY: f64 = 0.85;

/// Case-insensitive fuzzy match of an actual sheet name against a category's
/// known variations: exact, substring in either direction, or Jaro-Winkler
/// similarity above threshold.
pub fn sheet_name_matches(sheet_name: &str, category: SheetCategory) -> bool {
    let lowered = sheet_name.trim().to_lowercase();
    category.synonyms().iter().any(|pattern| {
        lowered == *pattern
            || lowered.contains(pattern)
            || pattern.contains(lowered.as_str())
            || strsim::jaro_winkler(&lowered, pattern) >= SHEET_NAME_SIMILARITY
    })
}

/// First sheet matching the category, or None when the workbook has no
/// recognizable sheet of that kind.
pub fn find_sheet<'a>(sheets: &'a [CellGrid], category: SheetCategory) -> Option<&'a CellGrid> {
    sheets
        .iter()
        .find(|grid| sheet_name_matches(&grid.name, category))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(1), "B");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(27), "AB");
    }

    #[test]
    fn test_cell_reference() {
        let grid = CellGrid::new("Returns", vec![]);
        assert_eq!(grid.cell_reference(4, 1), "Returns!B5");
        assert_eq!(grid.cell_reference(0, 0), "Returns!A1");
    }

    #[test]
    fn test_sheet_name_variations_resolve_to_same_category() {
        for name in ["Inv Returns", "Investment Returns", "INVESTMENT RETURNS "] {
            assert!(
                sheet_name_matches(name, SheetCategory::Returns),
                "{} should match Returns",
                name
            );
        }
    }

    #[test]
    fn test_unrelated_sheet_name_does_not_match() {
        assert!(!sheet_name_matches("Rent Roll", SheetCategory::Returns));
        assert!(!sheet_name_matches("Debt Schedule", SheetCategory::Overview));
    }

    #[test]
    fn test_find_sheet_prefers_first_match() {
        let sheets = vec![
            CellGrid::new("Cover", vec![]),
            CellGrid::new("Inv Returns", vec![]),
            CellGrid::new("Returns v2", vec![]),
        ];
        let found = find_sheet(&sheets, SheetCategory::Returns).unwrap();
        assert_eq!(found.name, "Inv Returns");
    }
}
