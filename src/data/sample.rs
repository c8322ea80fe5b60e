//! Synthetic titration generation from known parameters.
//!
//! The host concentration is held fixed and the guest is stepped evenly from
//! 0 to `guest_max`. Signals come from the requested model evaluated at the
//! true parameters, plus optional Gaussian noise.

use std::rc::Rc;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Dataset, GenerateConfig, MeasurementPoint};
use crate::error::AppError;
use crate::models::TitrationModel;

pub fn generate_dataset(config: &GenerateConfig) -> Result<Dataset, AppError> {
    validate(config)?;

    let signals = config.pure.len();
    let concentrations: Vec<MeasurementPoint> = (0..config.points)
        .map(|i| {
            let guest = config.guest_max * i as f64 / (config.points - 1) as f64;
            MeasurementPoint::new(config.host_conc, guest, vec![0.0; signals])
        })
        .collect();
    let skeleton = Rc::new(Dataset::new(concentrations.clone())?);

    let mut model = TitrationModel::unfitted(config.model, skeleton);
    model.set_constants(&config.log_constants);
    model.set_pure_signals(&config.pure);
    for (which, complex) in config.complex.iter().enumerate() {
        model.set_complex_signals(complex, which);
    }
    if model.is_corrupt() {
        return Err(AppError::new(
            4,
            "Equilibrium solver produced unphysical concentrations for these parameters.",
        ));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;

    let points = concentrations
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let data = (0..signals)
                .map(|c| {
                    let noise = if config.noise > 0.0 { normal.sample(&mut rng) } else { 0.0 };
                    model.predicted()[(i, c)] + noise
                })
                .collect();
            MeasurementPoint::new(p.conc1(), p.conc2(), data)
        })
        .collect();

    log::info!(
        "generated {} points for {} (log K = {:?}, noise sd {})",
        config.points,
        config.model.display_name(),
        config.log_constants,
        config.noise
    );
    Ok(Dataset::new(points)?)
}

fn validate(config: &GenerateConfig) -> Result<(), AppError> {
    let constants = config.model.constant_size();
    if config.points < 2 {
        return Err(AppError::new(2, "At least 2 points are required."));
    }
    if config.log_constants.len() != constants {
        return Err(AppError::new(
            2,
            format!(
                "{} needs {constants} log constant(s), got {}.",
                config.model.display_name(),
                config.log_constants.len()
            ),
        ));
    }
    if config.pure.is_empty() {
        return Err(AppError::new(2, "At least one pure signal is required."));
    }
    if config.complex.len() != constants {
        return Err(AppError::new(
            2,
            format!(
                "{} needs {constants} complex signal list(s), got {}.",
                config.model.display_name(),
                config.complex.len()
            ),
        ));
    }
    if config.complex.iter().any(|c| c.len() != config.pure.len()) {
        return Err(AppError::new(
            2,
            "Every complex signal list must have one value per pure signal.",
        ));
    }
    if !(config.host_conc.is_finite() && config.host_conc > 0.0) {
        return Err(AppError::new(2, "Host concentration must be > 0."));
    }
    if !(config.guest_max.is_finite() && config.guest_max > 0.0) {
        return Err(AppError::new(2, "Maximum guest concentration must be > 0."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::new(2, "Noise must be finite and >= 0."));
    }
    Ok(())
}
