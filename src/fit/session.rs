//! A set of live models sharing one dataset.
//!
//! The session owns the models so that flipping the host/guest selector can
//! recalculate every one of them, and ranks them with BIC.

use std::rc::Rc;

use serde::Serialize;

use crate::domain::{Dataset, ModelKind, OptimizerConfig};
use crate::fit::FitOutcome;
use crate::models::TitrationModel;

/// BIC difference below which the simpler model is preferred.
const BIC_TIE: f64 = 2.0;

/// Goodness of fit for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRanking {
    pub kind: ModelKind,
    pub sse: f64,
    pub rmse: f64,
    /// `+inf` when the model has at least as many parameters as observations.
    pub bic: f64,
    /// Observations in the objective.
    pub n: usize,
    /// Free parameters.
    pub k: usize,
    pub corrupt: bool,
}

#[derive(Debug)]
pub struct FitSession {
    dataset: Rc<Dataset>,
    models: Vec<TitrationModel>,
}

impl FitSession {
    pub fn new(dataset: Rc<Dataset>) -> Self {
        Self {
            dataset,
            models: Vec::new(),
        }
    }

    pub fn dataset(&self) -> &Rc<Dataset> {
        &self.dataset
    }

    /// Build a seeded model of `kind` bound to the session's dataset.
    pub fn add_model(&mut self, kind: ModelKind, config: &OptimizerConfig) -> &mut TitrationModel {
        let model = TitrationModel::new(kind, Rc::clone(&self.dataset), config);
        self.models.push(model);
        let last = self.models.len() - 1;
        &mut self.models[last]
    }

    pub fn models(&self) -> &[TitrationModel] {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut [TitrationModel] {
        &mut self.models
    }

    pub fn model(&self, kind: ModelKind) -> Option<&TitrationModel> {
        self.models.iter().find(|m| m.kind() == kind)
    }

    /// Fit every model in insertion order.
    pub fn fit_all(&mut self, config: &OptimizerConfig) -> Vec<FitOutcome> {
        self.models.iter_mut().map(|m| m.fit(config)).collect()
    }

    pub fn host_is_conc1(&self) -> bool {
        self.dataset.host_selector().host_is_conc1()
    }

    /// Point the shared selector at `conc1` (or `conc2`) and recalculate every
    /// model.
    pub fn set_host_is_conc1(&mut self, host_is_conc1: bool) {
        self.dataset.host_selector().set_host_is_conc1(host_is_conc1);
        self.recalculate();
    }

    /// Swap host and guest for every model.
    pub fn flip_host(&mut self) {
        self.dataset.host_selector().flip();
        self.recalculate();
    }

    fn recalculate(&mut self) {
        for model in &mut self.models {
            model.calculate_signal();
        }
    }

    /// Every model's goodness of fit, best BIC first.
    pub fn rankings(&self) -> Vec<ModelRanking> {
        let mut rankings: Vec<ModelRanking> = self.models.iter().map(rank).collect();
        rankings.sort_by(|a, b| a.bic.total_cmp(&b.bic));
        rankings
    }

    /// The model to report, preferring the simpler one when BICs are close.
    pub fn preferred(&self) -> Option<ModelRanking> {
        select_by_bic(&self.rankings())
    }
}

fn rank(model: &TitrationModel) -> ModelRanking {
    let n = model.active_observations();
    let active = model.active_signals().iter().filter(|&&a| a).count();
    let k = model.kind().param_count(active);
    let sse = model.total_error();
    let rmse = if n > 0 { (sse / n as f64).sqrt() } else { 0.0 };
    let bic = if n > k { bic(n, sse, k) } else { f64::INFINITY };

    ModelRanking {
        kind: model.kind(),
        sse,
        rmse,
        bic,
        n,
        k,
        corrupt: model.is_corrupt(),
    }
}

fn bic(n: usize, sse: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let sse_per = (sse / n_f).max(1e-300);
    n_f * sse_per.ln() + (k as f64) * n_f.ln()
}

fn select_by_bic(rankings: &[ModelRanking]) -> Option<ModelRanking> {
    let best = rankings
        .iter()
        .filter(|r| !r.corrupt)
        .min_by(|a, b| a.bic.total_cmp(&b.bic))
        .or_else(|| rankings.first())?;
    let best_bic = best.bic;

    // Walk in order of increasing complexity and take the first close enough.
    for kind in ModelKind::ALL {
        if let Some(r) = rankings.iter().find(|r| r.kind == kind && !r.corrupt) {
            if r.bic <= best_bic + BIC_TIE {
                return Some(r.clone());
            }
        }
    }

    Some(best.clone())
}
