//! CSV exports.
//!
//! - `write_dataset_csv`: a dataset in the layout `load_dataset` reads back
//! - `write_fit_csv`: per-point observed, predicted and residual values for a
//!   fitted model, for spreadsheets or downstream scripts

use std::io::Write;
use std::path::Path;

use crate::domain::{Dataset, PlotMode};
use crate::error::AppError;
use crate::models::TitrationModel;

/// Write `dataset` as `conc1,conc2,signal_1..` to `path`.
pub fn write_dataset_csv(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    let file = std::fs::File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    write_dataset(file, dataset)
}

/// Write `dataset` as CSV to any writer.
pub fn write_dataset<W: Write>(out: W, dataset: &Dataset) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["conc1".to_string(), "conc2".to_string()];
    header.extend((1..=dataset.signal_count()).map(|i| format!("signal_{i}")));
    writer.write_record(&header).map_err(write_error)?;

    for point in dataset.points() {
        let mut row = vec![point.conc1().to_string(), point.conc2().to_string()];
        row.extend(point.data().iter().map(|v| v.to_string()));
        writer.write_record(&row).map_err(write_error)?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write CSV: {e}")))
}

/// Write one row per point with the x value and, per channel, observed,
/// predicted and residual columns.
pub fn write_fit_csv(path: &Path, model: &TitrationModel, plot_mode: PlotMode) -> Result<(), AppError> {
    let file = std::fs::File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    let dataset = model.dataset();

    let mut header = vec!["point".to_string(), "x".to_string()];
    for c in 1..=model.signal_count() {
        header.push(format!("observed_{c}"));
        header.push(format!("predicted_{c}"));
        header.push(format!("residual_{c}"));
    }
    writer.write_record(&header).map_err(write_error)?;

    for i in 0..model.data_points() {
        let mut row = vec![(i + 1).to_string(), format!("{:.10}", model.x_value(i, plot_mode))];
        for c in 0..model.signal_count() {
            row.push(format!("{:.6}", dataset.observed(i, c)));
            row.push(format!("{:.6}", model.predicted()[(i, c)]));
            row.push(format!("{:.6}", model.residuals()[(i, c)]));
        }
        writer.write_record(&row).map_err(write_error)?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write CSV: {e}")))
}

fn write_error(e: csv::Error) -> AppError {
    AppError::new(2, format!("Failed to write CSV row: {e}"))
}
