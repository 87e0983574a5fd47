use crate::types::{CellValue, Sheet, Workbook};
use crate::util::parse_date_safe;
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;

/// Diagnostics from loading a workbook, printed by the shell the same way
/// row/parse-error counts are reported after a load.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub sheet_count: usize,
    pub total_rows: usize,
    pub skipped_cells: usize,
}

/// Load an `.xlsx` workbook from disk into named, typed sheets.
///
/// The first row of every sheet is taken as the header; error cells are
/// counted and treated as empty rather than failing the load.
pub fn load_workbook(path: &str) -> Result<(Workbook, LoadReport)> {
    let wb =
        open_workbook_auto(path).with_context(|| format!("failed to open workbook {}", path))?;
    read_sheets(wb)
}

/// Same as [`load_workbook`] but over an in-memory buffer, e.g. an uploaded
/// file that never touched disk.
pub fn load_workbook_from_bytes(bytes: &[u8]) -> Result<(Workbook, LoadReport)> {
    let wb = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("failed to open workbook from buffer")?;
    read_sheets(wb)
}

fn read_sheets<RS, R>(mut wb: R) -> Result<(Workbook, LoadReport)>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: std::error::Error + Send + Sync + 'static,
{
    let names: Vec<String> = wb.sheet_names().to_vec();

    let mut sheets = Vec::new();
    let mut total_rows = 0usize;
    let mut skipped_cells = 0usize;
    for name in &names {
        let range = wb
            .worksheet_range(name)
            .with_context(|| format!("failed to read sheet {}", name))?;
        let (sheet, skipped) = sheet_from_range(name, &range);
        total_rows += sheet.rows.len();
        skipped_cells += skipped;
        sheets.push(sheet);
    }

    let report = LoadReport {
        sheet_count: sheets.len(),
        total_rows,
        skipped_cells,
    };
    Ok((Workbook { sheets }, report))
}

fn sheet_from_range(name: &str, range: &Range<Data>) -> (Sheet, usize) {
    let mut rows_iter = range.rows();
    let columns: Vec<String> = match rows_iter.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let label = cell.to_string().trim().to_string();
                if label.is_empty() {
                    format!("Column{}", i + 1)
                } else {
                    label
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let mut skipped = 0usize;
    let mut rows = Vec::new();
    for raw in rows_iter {
        let mut row = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let value = match raw.get(i) {
                Some(cell) => convert_cell(cell, &mut skipped),
                None => CellValue::Empty,
            };
            row.push(value);
        }
        // A row of nothing but blanks carries no record.
        if row.iter().any(|c| *c != CellValue::Empty) {
            rows.push(row);
        }
    }

    (
        Sheet {
            name: name.to_string(),
            columns,
            rows,
        },
        skipped,
    )
}

fn convert_cell(data: &Data, skipped: &mut usize) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(t.to_string())
            }
        }
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => CellValue::Date(ndt.date()),
            None => {
                *skipped += 1;
                CellValue::Empty
            }
        },
        Data::DateTimeIso(s) => match parse_date_safe(s) {
            Some(d) => CellValue::Date(d),
            None => CellValue::Text(s.clone()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => {
            *skipped += 1;
            CellValue::Empty
        }
    }
}
