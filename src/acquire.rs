use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::grid::{CellGrid, CellValue};

/// Declared format of an uploaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    Spreadsheet,
    PlainText,
    Email,
}

impl MediaType {
    /// Resolve a media type from a file name when the caller did not declare
    /// one. Unknown extensions fall back to plain text rather than failing,
    /// since most stray uploads are readable as text.
    pub fn from_file_name(file_name: &str) -> MediaType {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        match (mime.type_().as_str(), mime.subtype().as_str()) {
            ("application", "pdf") => MediaType::Pdf,
            ("application", sub) if sub.contains("spreadsheet") || sub.contains("excel") => {
                MediaType::Spreadsheet
            }
            ("message", _) => MediaType::Email,
            _ => {
                let ext = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
                match ext.as_str() {
                    "xlsx" | "xls" | "xlsm" | "ods" => MediaType::Spreadsheet,
                    "eml" => MediaType::Email,
                    _ => MediaType::PlainText,
                }
            }
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MediaType::Pdf => "pdf",
            MediaType::Spreadsheet => "spreadsheet",
            MediaType::PlainText => "plain_text",
            MediaType::Email => "email",
        };
        write!(f, "{}", label)
    }
}

/// Normalized output of text acquisition: page-ordered plain text for
/// documents, plus per-sheet labeled grids for tabular formats.
#[derive(Debug, Clone)]
pub struct AcquiredText {
    pub plain_text: String,
    pub sheets: Vec<CellGrid>,
    pub page_count: usize,
    /// Set when a page-based document yielded too little text to be useful,
    /// signaling the caller to route it to visual extraction instead of
    /// passing near-empty text downstream.
    pub needs_visual_extraction: bool,
}

/// Convert raw uploaded bytes into plain text and (for tabular formats) cell
/// grids. Unreadable input surfaces as a typed acquisition failure; nothing
/// here panics past the boundary.
pub fn acquire(bytes: &[u8], media_type: MediaType, min_useful_text_len: usize) -> Result<AcquiredText> {
    match media_type {
        MediaType::Pdf => acquire_pdf(bytes, min_useful_text_len),
        MediaType::Spreadsheet => acquire_spreadsheet(bytes),
        MediaType::PlainText => Ok(plain(decode_text(bytes))),
        MediaType::Email => Ok(plain(format_email(&decode_text(bytes)))),
    }
}

fn plain(text: String) -> AcquiredText {
    AcquiredText {
        plain_text: text,
        sheets: Vec::new(),
        page_count: 1,
        needs_visual_extraction: false,
    }
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn acquire_pdf(bytes: &[u8], min_useful_text_len: usize) -> Result<AcquiredText> {
    // pdf-extract can panic on malformed files, so the call is fenced.
    let owned = bytes.to_vec();
    let outcome = std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned));

    let text = match outcome {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            return Err(PipelineError::Acquisition(format!(
                "Invalid or corrupted PDF file: {}",
                e
            )))
        }
        Err(_) => {
            return Err(PipelineError::Acquisition(
                "PDF extraction panicked (malformed file)".to_string(),
            ))
        }
    };

    // Pages arrive separated by form feeds.
    let page_count = text.split('\u{c}').count().max(1);
    let trimmed_len = text.trim().len();
    let needs_visual_extraction = trimmed_len < min_useful_text_len;
    if needs_visual_extraction {
        warn!(
            "PDF produced only {} characters across {} pages; flagging for visual extraction",
            trimmed_len, page_count
        );
    } else {
        info!("Extracted {} characters from {} PDF pages", trimmed_len, page_count);
    }

    Ok(AcquiredText {
        plain_text: text,
        sheets: Vec::new(),
        page_count,
        needs_visual_extraction,
    })
}

const SAMPLE_ROWS_PER_SHEET: usize = 5;

fn acquire_spreadsheet(bytes: &[u8]) -> Result<AcquiredText> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| PipelineError::Acquisition(format!("Invalid or corrupted workbook: {}", e)))?;

    let mut sheets = Vec::new();
    let mut text_parts = Vec::new();

    for sheet_name in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                warn!("Skipping unreadable sheet '{}': {}", sheet_name, e);
                continue;
            }
        };

        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(cell_value).collect())
            .collect();

        // A short sample of each sheet is enough for classification and
        // narrative context; the grids carry the full data.
        text_parts.push(format!(
            "--- Sheet: {} ({} rows x {} cols) ---",
            sheet_name,
            rows.len(),
            rows.first().map(Vec::len).unwrap_or(0)
        ));
        for (idx, row) in rows.iter().take(SAMPLE_ROWS_PER_SHEET).enumerate() {
            let rendered: Vec<String> = row.iter().map(render_cell).collect();
            text_parts.push(format!("Row {}: {}", idx + 1, rendered.join(" | ")));
        }

        sheets.push(CellGrid::new(sheet_name, rows));
    }

    if sheets.is_empty() {
        return Err(PipelineError::Acquisition(
            "Workbook contains no readable sheets".to_string(),
        ));
    }

    info!("Parsed workbook with {} sheets", sheets.len());

    Ok(AcquiredText {
        plain_text: text_parts.join("\n"),
        sheets,
        page_count: 1,
        needs_visual_extraction: false,
    })
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(format!("#ERR({:?})", e)),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn render_cell(cell: &CellValue) -> String {
    match cell {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => format!("{}", n),
        CellValue::Bool(b) => b.to_string(),
    }
}

/// Render an RFC-822-ish message as readable text: the interesting headers
/// first, then the body. Header parsing stops at the first blank line.
fn format_email(raw: &str) -> String {
    let mut from = "Unknown";
    let mut to = "Unknown";
    let mut subject = "No Subject";
    let mut date = "Unknown";

    let mut body_start = 0;
    for (offset, line) in raw.split_inclusive('\n').scan(0usize, |pos, line| {
        let start = *pos;
        *pos += line.len();
        Some((start, line))
    }) {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            body_start = offset + line.len();
            break;
        }
        if let Some(value) = trimmed.strip_prefix("From:") {
            from = value.trim();
        } else if let Some(value) = trimmed.strip_prefix("To:") {
            to = value.trim();
        } else if let Some(value) = trimmed.strip_prefix("Subject:") {
            subject = value.trim();
        } else if let Some(value) = trimmed.strip_prefix("Date:") {
            date = value.trim();
        }
    }

    let body = raw[body_start..].trim();
    format!(
        "--- Email ---\nFrom: {}\nTo: {}\nSubject: {}\nDate: {}\n\n--- Body ---\n{}",
        from, to, subject, date, body
    )
}
