//! Delimited-table ingest.
//!
//! Turns a titration table into a validated `Dataset`:
//!
//! - columns are `conc1, conc2, signal_1 … signal_n`
//! - the delimiter is sniffed from the first non-empty line (tab, comma,
//!   semicolon, otherwise runs of spaces)
//! - a first row whose leading cell is not a number is taken as a header
//! - rows with non-numeric cells or the wrong width are skipped and reported

use std::fs;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Dataset, MeasurementPoint};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// One-based line in the input.
    pub line: usize,
    pub message: String,
}

/// Ingest output: the dataset plus what was skipped.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    /// Column names after `conc1, conc2`, or generated `signal_<n>` names.
    pub signal_names: Vec<String>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load a titration table from `path`.
pub fn load_dataset(path: &Path) -> Result<IngestedData, AppError> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to open input '{}': {e}", path.display())))?;
    parse_dataset(&content)
}

/// Parse a titration table held in memory.
pub fn parse_dataset(content: &str) -> Result<IngestedData, AppError> {
    let delimiter = sniff_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(content.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut points = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut width: Option<usize> = None;

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line() as usize);
                row_errors.push(RowError {
                    line,
                    message: format!("parse error: {e}"),
                });
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line() as usize);
        let cells = cells(&record);
        if cells.is_empty() {
            continue;
        }

        if header.is_none() && points.is_empty() && row_errors.is_empty() && cells[0].parse::<f64>().is_err() {
            header = Some(cells.iter().map(|c| c.to_string()).collect());
            width = Some(cells.len());
            continue;
        }

        rows_read += 1;
        match parse_row(&cells, width) {
            Ok(point) => {
                width.get_or_insert(cells.len());
                points.push(point);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if points.is_empty() {
        return Err(AppError::new(3, "No valid measurement rows in input."));
    }

    let dataset = Dataset::new(points)?;
    let signal_names = match header {
        Some(names) if names.len() == dataset.signal_count() + 2 => names[2..].to_vec(),
        _ => (1..=dataset.signal_count()).map(|i| format!("signal_{i}")).collect(),
    };

    for err in &row_errors {
        log::warn!("line {}: {}", err.line, err.message);
    }

    Ok(IngestedData {
        dataset,
        signal_names,
        row_errors,
        rows_read,
    })
}

fn sniff_delimiter(content: &str) -> u8 {
    let first = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or("");

    [b'\t', b',', b';']
        .into_iter()
        .find(|&d| first.as_bytes().contains(&d))
        .unwrap_or(b' ')
}

/// Non-empty cells; runs of spaces produce empty cells that carry nothing.
fn cells(record: &StringRecord) -> Vec<&str> {
    record.iter().filter(|c| !c.is_empty()).collect()
}

fn parse_row(cells: &[&str], width: Option<usize>) -> Result<MeasurementPoint, String> {
    if cells.len() < 3 {
        return Err(format!(
            "expected conc1, conc2 and at least one signal, found {} cells",
            cells.len()
        ));
    }
    if let Some(w) = width {
        if cells.len() != w {
            return Err(format!("expected {w} cells, found {}", cells.len()));
        }
    }

    let values = cells
        .iter()
        .enumerate()
        .map(|(i, c)| {
            c.parse::<f64>()
                .map_err(|_| format!("cell {} is not a number: `{c}`", i + 1))
        })
        .collect::<Result<Vec<f64>, String>>()?;

    Ok(MeasurementPoint::new(values[0], values[1], values[2..].to_vec()))
}
