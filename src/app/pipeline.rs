//! Shared "fit pipeline" logic.
//!
//! Keeping this in one place keeps the workflow testable without the CLI:
//! ingest -> selector + active mask -> seed models -> fit -> rank

use std::rc::Rc;

use crate::domain::{Dataset, FitConfig};
use crate::error::AppError;
use crate::fit::{FitOutcome, FitSession, ModelRanking};
use crate::io::ingest::{IngestedData, RowError, load_dataset};

/// All computed outputs of a single `tfit fit` run.
#[derive(Debug)]
pub struct RunOutput {
    pub session: FitSession,
    pub signal_names: Vec<String>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub outcomes: Vec<FitOutcome>,
    /// Best BIC first.
    pub rankings: Vec<ModelRanking>,
    pub preferred: Option<ModelRanking>,
}

/// Load `config.input` and run the full fit.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let ingest = load_dataset(&config.input)?;
    run_fit_on(config, ingest)
}

/// Run the fit on already-ingested data.
pub fn run_fit_on(config: &FitConfig, ingest: IngestedData) -> Result<RunOutput, AppError> {
    config
        .optimizer
        .validate()
        .map_err(|e| AppError::new(2, format!("Invalid optimizer settings: {e}")))?;

    let IngestedData {
        dataset,
        signal_names,
        row_errors,
        rows_read,
    } = ingest;

    if dataset.data_points() < 2 {
        return Err(AppError::new(3, "At least 2 titration points are required to fit."));
    }
    let mask = active_mask(&dataset, &config.inactive)?;

    let dataset = Rc::new(dataset);
    dataset
        .host_selector()
        .set_host_is_conc1(config.host.host_is_conc1());

    let mut session = FitSession::new(dataset);
    for kind in config.model_spec.kinds() {
        let model = session.add_model(kind, &config.optimizer);
        model.set_active_signals(&mask);
    }

    let outcomes = session.fit_all(&config.optimizer);
    let rankings = session.rankings();
    let preferred = session.preferred();

    Ok(RunOutput {
        session,
        signal_names,
        row_errors,
        rows_read,
        outcomes,
        rankings,
        preferred,
    })
}

/// Active-channel mask from zero-based inactive channel indices.
fn active_mask(dataset: &Dataset, inactive: &[usize]) -> Result<Vec<bool>, AppError> {
    let mut mask = vec![true; dataset.signal_count()];
    for &channel in inactive {
        let Some(slot) = mask.get_mut(channel) else {
            return Err(AppError::new(
                2,
                format!(
                    "Inactive channel {} does not exist (dataset has {} signals).",
                    channel + 1,
                    dataset.signal_count()
                ),
            ));
        };
        *slot = false;
    }
    if !mask.iter().any(|&a| a) {
        return Err(AppError::new(3, "Every signal channel is inactive; nothing to fit."));
    }
    Ok(mask)
}
