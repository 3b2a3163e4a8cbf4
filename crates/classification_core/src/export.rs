//! crates/classification_core/src/export.rs
//!
//! Renders a material's ordered, ancestry-flattened segments into an `.xlsx`
//! workbook with a fixed column layout.

use std::sync::OnceLock;

use regex::Regex;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};

use crate::domain::{SegmentWithAncestry, LEVEL_COUNT};
use crate::error::{CoreError, CoreResult};

pub const SHEET_NAME: &str = "Segments";
pub const FILE_EXTENSION: &str = "xlsx";
pub const CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const CONTENT_COLUMN_WIDTH: f64 = 80.0;
const DEFAULT_COLUMN_WIDTH: f64 = 20.0;

/// One data row of the export, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    /// 1-based position in the export, not the stored `order_index`.
    pub number: usize,
    pub content: String,
    pub page_number: i32,
    pub levels: [String; LEVEL_COUNT],
}

/// Header cells, in column order.
pub fn headers() -> Vec<String> {
    let mut headers = vec![
        "#".to_string(),
        "Paragraph".to_string(),
        "Page".to_string(),
    ];
    headers.extend((1..=LEVEL_COUNT).map(|level| format!("Level {}", level)));
    headers
}

/// Numbers the rows in the order given. Callers pass segments already sorted
/// in display order.
pub fn build_rows(segments: &[SegmentWithAncestry]) -> Vec<ExportRow> {
    segments
        .iter()
        .enumerate()
        .map(|(i, row)| ExportRow {
            number: i + 1,
            content: row.segment.content.clone(),
            page_number: row.segment.page_number,
            levels: row.category_path.clone(),
        })
        .collect()
}

/// Writes the rows into a single right-to-left worksheet and returns the
/// serialized workbook.
pub fn render_workbook(rows: &[ExportRow]) -> CoreResult<Vec<u8>> {
    write_workbook(rows).map_err(|e| CoreError::Export(e.to_string()))
}

fn write_workbook(rows: &[ExportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let cell = Format::new()
        .set_text_wrap()
        .set_align(FormatAlign::Top)
        .set_align(FormatAlign::Right);
    let header = cell.clone().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    sheet.set_right_to_left(true);

    let headers = headers();
    for (col, title) in headers.iter().enumerate() {
        let col = col as u16;
        let width = if col == 1 {
            CONTENT_COLUMN_WIDTH
        } else {
            DEFAULT_COLUMN_WIDTH
        };
        sheet.set_column_width(col, width)?;
        sheet.write_string_with_format(0, col, title, &header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write_number_with_format(r, 0, row.number as f64, &cell)?;
        sheet.write_string_with_format(r, 1, &row.content, &cell)?;
        sheet.write_number_with_format(r, 2, f64::from(row.page_number), &cell)?;
        for (level, name) in row.levels.iter().enumerate() {
            sheet.write_string_with_format(r, 3 + level as u16, name, &cell)?;
        }
    }

    workbook.save_to_buffer()
}

fn unsafe_filename_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[^A-Za-z0-9\x{0600}-\x{06FF}]").expect("filename pattern is valid")
    })
}

/// The suggested download name: every character outside ASCII letters and
/// digits and the Arabic block becomes `_`.
pub fn export_filename(title: &str) -> String {
    let safe = unsafe_filename_chars().replace_all(title, "_");
    format!("{}.{}", safe, FILE_EXTENSION)
}
