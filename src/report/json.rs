//! Machine-readable report for `tfit fit --json`.

use serde::Serialize;

use crate::app::pipeline::RunOutput;
use crate::domain::{FitConfig, ModelKind};
use crate::fit::{FitOutcome, ModelRanking};

#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub input: String,
    pub points: usize,
    pub signals: Vec<String>,
    pub host_is_conc1: bool,
    pub models: Vec<ModelReport>,
    pub rankings: Vec<ModelRanking>,
    pub preferred: Option<ModelKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub kind: ModelKind,
    pub name: &'static str,
    pub constants: Vec<NamedConstant>,
    pub pure_signals: Vec<f64>,
    /// One vector per constant, same order as `constants`.
    pub complex_signals: Vec<Vec<f64>>,
    /// Per-channel SSE (0 for inactive channels).
    pub channel_sse: Vec<f64>,
    pub outcome: FitOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedConstant {
    pub name: &'static str,
    pub log_k: f64,
}

impl FitReport {
    pub fn from_run(run: &RunOutput, config: &FitConfig) -> Self {
        let dataset = run.session.dataset();
        let models = run
            .session
            .models()
            .iter()
            .zip(&run.outcomes)
            .map(|(model, outcome)| {
                let signals = model.all_signals();
                ModelReport {
                    kind: model.kind(),
                    name: model.name(),
                    constants: model
                        .kind()
                        .constant_names()
                        .iter()
                        .zip(model.constants())
                        .map(|(&name, &log_k)| NamedConstant { name, log_k })
                        .collect(),
                    pure_signals: signals[0].clone(),
                    complex_signals: signals[1..].to_vec(),
                    channel_sse: (0..model.signal_count()).map(|c| model.sum_of_errors(c)).collect(),
                    outcome: outcome.clone(),
                }
            })
            .collect();

        Self {
            input: config.input.display().to_string(),
            points: dataset.data_points(),
            signals: run.signal_names.clone(),
            host_is_conc1: run.session.host_is_conc1(),
            models,
            rankings: run.rankings.clone(),
            preferred: run.preferred.as_ref().map(|p| p.kind),
        }
    }
}
