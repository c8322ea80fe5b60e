//! Shared domain types.
//!
//! This module defines:
//!
//! - measurement points and the dataset they form (`MeasurementPoint`, `Dataset`)
//! - the shared host/guest selection cell (`HostSelector`)
//! - input configuration enums (`ModelSpec`, `Strategy`, `PlotMode`, `HostColumn`)
//! - the concrete binding topologies (`ModelKind`)
//! - optimizer and run configuration (`OptimizerConfig`, `FitConfig`, `GenerateConfig`)

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while assembling a dataset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("dataset has no measurement points")]
    Empty,

    #[error("dataset has no signal channels")]
    NoSignals,

    #[error("point {index} has {found} signals, expected {expected}")]
    RaggedSignals {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("point {index} has an invalid concentration ({value}); concentrations must be finite and >= 0")]
    InvalidConcentration { index: usize, value: f64 },

    #[error("point {index} has a non-finite signal value")]
    NonFiniteSignal { index: usize },
}

/// One titration step: two initial concentrations and the observed signals.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPoint {
    conc1: f64,
    conc2: f64,
    data: Vec<f64>,
}

impl MeasurementPoint {
    pub fn new(conc1: f64, conc2: f64, data: Vec<f64>) -> Self {
        Self { conc1, conc2, data }
    }

    pub fn conc1(&self) -> f64 {
        self.conc1
    }

    pub fn conc2(&self) -> f64 {
        self.conc2
    }

    /// Observed signal values, one per channel.
    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

/// Which initial concentration is the host, shared by every model on a dataset.
///
/// Cloning hands out another handle to the same cell, so a flip through any
/// handle is seen by all of them. `true` means `conc1` is the host.
#[derive(Debug, Clone)]
pub struct HostSelector(Rc<Cell<bool>>);

impl HostSelector {
    pub fn new(host_is_conc1: bool) -> Self {
        Self(Rc::new(Cell::new(host_is_conc1)))
    }

    pub fn host_is_conc1(&self) -> bool {
        self.0.get()
    }

    pub fn set_host_is_conc1(&self, value: bool) {
        self.0.set(value);
    }

    /// Swap host and guest roles.
    pub fn flip(&self) {
        self.0.set(!self.0.get());
    }
}

impl Default for HostSelector {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Abscissa used when the dataset or a model is charted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PlotMode {
    /// Initial host concentration.
    Host,
    /// Initial guest concentration.
    Guest,
    /// Guest / host equivalents.
    GuestOverHost,
    /// Host / guest ratio.
    HostOverGuest,
}

/// An ordered titration series.
///
/// Point order is the titration order. The dataset is immutable once built;
/// only the host selection may change afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    points: Vec<MeasurementPoint>,
    signal_count: usize,
    host: HostSelector,
}

impl Dataset {
    /// Build a dataset, validating that every point carries the same number of
    /// finite signals and non-negative concentrations.
    pub fn new(points: Vec<MeasurementPoint>) -> Result<Self, DatasetError> {
        Self::with_selector(points, HostSelector::default())
    }

    pub fn with_selector(
        points: Vec<MeasurementPoint>,
        host: HostSelector,
    ) -> Result<Self, DatasetError> {
        let first = points.first().ok_or(DatasetError::Empty)?;
        let signal_count = first.data.len();
        if signal_count == 0 {
            return Err(DatasetError::NoSignals);
        }

        for (index, p) in points.iter().enumerate() {
            if p.data.len() != signal_count {
                return Err(DatasetError::RaggedSignals {
                    index,
                    expected: signal_count,
                    found: p.data.len(),
                });
            }
            for value in [p.conc1, p.conc2] {
                if !(value.is_finite() && value >= 0.0) {
                    return Err(DatasetError::InvalidConcentration { index, value });
                }
            }
            if p.data.iter().any(|v| !v.is_finite()) {
                return Err(DatasetError::NonFiniteSignal { index });
            }
        }

        Ok(Self {
            points,
            signal_count,
            host,
        })
    }

    pub fn points(&self) -> &[MeasurementPoint] {
        &self.points
    }

    pub fn data_points(&self) -> usize {
        self.points.len()
    }

    pub fn signal_count(&self) -> usize {
        self.signal_count
    }

    /// A handle to the shared host selection cell.
    pub fn host_selector(&self) -> &HostSelector {
        &self.host
    }

    /// `(host_0, guest_0)` for point `i` under the current host selection.
    pub fn initial_concentrations(&self, i: usize) -> (f64, f64) {
        let p = &self.points[i];
        if self.host.host_is_conc1() {
            (p.conc1, p.conc2)
        } else {
            (p.conc2, p.conc1)
        }
    }

    /// Observed signal on `channel` at point `i`.
    pub fn observed(&self, i: usize, channel: usize) -> f64 {
        self.points[i].data[channel]
    }

    /// Abscissa of point `i` for the given plot mode.
    pub fn x_value(&self, i: usize, mode: PlotMode) -> f64 {
        let (host_0, guest_0) = self.initial_concentrations(i);
        match mode {
            PlotMode::Host => host_0,
            PlotMode::Guest => guest_0,
            PlotMode::GuestOverHost => guest_0 / host_0,
            PlotMode::HostOverGuest => host_0 / guest_0,
        }
    }

    pub fn first_signals(&self) -> &[f64] {
        &self.points[0].data
    }

    pub fn last_signals(&self) -> &[f64] {
        &self.points[self.points.len() - 1].data
    }
}

/// Concrete binding topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ModelKind {
    /// Single 1:1 complex HG.
    #[serde(rename = "1:1")]
    #[value(name = "1:1")]
    OneOne,
    /// H2G and HG coexisting.
    #[serde(rename = "2:1/1:1")]
    #[value(name = "2:1/1:1")]
    TwoOneOneOne,
    /// HG and HG2 coexisting.
    #[serde(rename = "1:1/1:2")]
    #[value(name = "1:1/1:2")]
    OneOneOneTwo,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::OneOne,
        ModelKind::TwoOneOneOne,
        ModelKind::OneOneOneTwo,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::OneOne => "1:1-Model",
            ModelKind::TwoOneOneOne => "2:1/1:1-Model",
            ModelKind::OneOneOneTwo => "1:1/1:2-Model",
        }
    }

    /// Number of equilibrium constants (and of complex signal vectors).
    pub fn constant_size(self) -> usize {
        match self {
            ModelKind::OneOne => 1,
            ModelKind::TwoOneOneOne | ModelKind::OneOneOneTwo => 2,
        }
    }

    /// Labels for the constants, in storage order.
    pub fn constant_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::OneOne => &["K11"],
            ModelKind::TwoOneOneOne => &["K21", "K11"],
            ModelKind::OneOneOneTwo => &["K11", "K12"],
        }
    }

    /// Total free parameter count for information criteria.
    pub fn param_count(self, signal_count: usize) -> usize {
        self.constant_size() + signal_count * (1 + self.constant_size())
    }
}

/// Which model(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ModelSpec {
    #[value(name = "1:1")]
    OneOne,
    #[value(name = "2:1/1:1")]
    TwoOneOneOne,
    #[value(name = "1:1/1:2")]
    OneOneOneTwo,
    All,
}

impl ModelSpec {
    pub fn kinds(self) -> Vec<ModelKind> {
        match self {
            ModelSpec::OneOne => vec![ModelKind::OneOne],
            ModelSpec::TwoOneOneOne => vec![ModelKind::TwoOneOneOne],
            ModelSpec::OneOneOneTwo => vec![ModelKind::OneOneOneTwo],
            ModelSpec::All => ModelKind::ALL.to_vec(),
        }
    }
}

/// Which optimizer drives a full fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Joint Levenberg-Marquardt over all parameters.
    Levmar,
    /// Alternating coordinate descent on constants, then signals.
    Descent,
}

/// Which concentration column holds the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HostColumn {
    Conc1,
    Conc2,
}

impl HostColumn {
    pub fn host_is_conc1(self) -> bool {
        self == HostColumn::Conc1
    }
}

/// Optimizer settings shared by both strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub strategy: Strategy,

    /// Iteration budget for Levenberg-Marquardt.
    pub max_iter: usize,
    /// Initial damping scale (`mu = tau * max diag(JᵀJ)`).
    pub lm_tau: f64,
    /// Gradient tolerance (`‖Jᵀr‖∞`).
    pub lm_eps1: f64,
    /// Relative step tolerance.
    pub lm_eps2: f64,
    /// Residual tolerance (`‖r‖²`).
    pub lm_eps3: f64,
    /// Finite-difference step for the Jacobian.
    pub lm_delta: f64,

    /// Outer iteration budget for coordinate descent.
    pub cd_max_iter: usize,
    /// Central-difference perturbation.
    pub cd_perturbation: f64,
    /// Starting step size for every parameter.
    pub cd_initial_step: f64,
    /// Stop when the gradient norm drops below this.
    pub cd_gradient_tol: f64,

    /// Constants/signals alternation count for the descent strategy.
    pub fit_cycles: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Levmar,
            max_iter: 1000,
            lm_tau: 1e-3,
            lm_eps1: 1e-15,
            lm_eps2: 1e-15,
            lm_eps3: 1e-20,
            lm_delta: 1e-6,
            cd_max_iter: 300,
            cd_perturbation: 1e-5,
            cd_initial_step: 1e-2,
            cd_gradient_tol: 1e-8,
            fit_cycles: 20,
        }
    }
}

impl OptimizerConfig {
    /// Checks that budgets are non-zero and tolerances are finite and non-negative.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_iter == 0 {
            return Err("max_iter must be > 0");
        }
        if self.cd_max_iter == 0 {
            return Err("cd_max_iter must be > 0");
        }
        if !(self.lm_delta.is_finite() && self.lm_delta > 0.0) {
            return Err("lm_delta must be finite and > 0");
        }
        if !(self.cd_perturbation.is_finite() && self.cd_perturbation > 0.0) {
            return Err("cd_perturbation must be finite and > 0");
        }
        if !(self.cd_initial_step.is_finite() && self.cd_initial_step > 0.0) {
            return Err("cd_initial_step must be finite and > 0");
        }
        for tol in [
            self.lm_tau,
            self.lm_eps1,
            self.lm_eps2,
            self.lm_eps3,
            self.cd_gradient_tol,
        ] {
            if !(tol.is_finite() && tol >= 0.0) {
                return Err("tolerances must be finite and non-negative");
            }
        }
        Ok(())
    }
}

/// A `tfit fit` run as understood by the pipeline.
///
/// Derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub input: PathBuf,
    pub model_spec: ModelSpec,
    pub host: HostColumn,
    pub plot_mode: PlotMode,
    /// Zero-based channels excluded from the fit objective.
    pub inactive: Vec<usize>,
    pub optimizer: OptimizerConfig,
    pub json: bool,
    /// Per-point CSV of the preferred model's predictions.
    pub export: Option<PathBuf>,
}

/// Synthetic dataset settings for `tfit generate`.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub model: ModelKind,
    /// log10 of each constant, in the model's storage order.
    pub log_constants: Vec<f64>,
    /// Pure host response per channel.
    pub pure: Vec<f64>,
    /// One response vector per complex, each one value per channel.
    pub complex: Vec<Vec<f64>>,
    /// Fixed initial host concentration.
    pub host_conc: f64,
    /// Guest concentration at the last point (the first is 0).
    pub guest_max: f64,
    pub points: usize,
    /// Standard deviation of additive Gaussian noise (0 disables noise).
    pub noise: f64,
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_points() -> Vec<MeasurementPoint> {
        vec![
            MeasurementPoint::new(1.0, 0.0, vec![0.1, 0.2]),
            MeasurementPoint::new(1.0, 2.0, vec![0.3, 0.4]),
        ]
    }

    #[test]
    fn dataset_rejects_ragged_signals() {
        let mut points = two_points();
        points.push(MeasurementPoint::new(1.0, 3.0, vec![0.5]));
        let err = Dataset::new(points).unwrap_err();
        assert_eq!(
            err,
            DatasetError::RaggedSignals {
                index: 2,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn dataset_rejects_negative_concentration() {
        let points = vec![MeasurementPoint::new(-1.0, 0.0, vec![0.0])];
        assert!(matches!(
            Dataset::new(points),
            Err(DatasetError::InvalidConcentration { index: 0, .. })
        ));
    }

    #[test]
    fn dataset_rejects_empty() {
        assert_eq!(Dataset::new(Vec::new()).unwrap_err(), DatasetError::Empty);
    }

    #[test]
    fn selector_flip_swaps_host_and_guest() {
        let data = Dataset::new(two_points()).unwrap();
        assert_eq!(data.initial_concentrations(1), (1.0, 2.0));
        assert_eq!(data.x_value(1, PlotMode::GuestOverHost), 2.0);

        let handle = data.host_selector().clone();
        handle.flip();

        assert_eq!(data.initial_concentrations(1), (2.0, 1.0));
        assert_eq!(data.x_value(1, PlotMode::Host), 2.0);
        assert_eq!(data.x_value(1, PlotMode::GuestOverHost), 0.5);
    }

    #[test]
    fn datasets_can_share_one_selector() {
        let selector = HostSelector::default();
        let a = Dataset::with_selector(two_points(), selector.clone()).unwrap();
        let b = Dataset::with_selector(two_points(), selector.clone()).unwrap();

        selector.set_host_is_conc1(false);

        assert!(!a.host_selector().host_is_conc1());
        assert_eq!(b.initial_concentrations(1), (2.0, 1.0));
    }

    #[test]
    fn param_count_includes_signals() {
        assert_eq!(ModelKind::OneOne.param_count(3), 1 + 3 * 2);
        assert_eq!(ModelKind::TwoOneOneOne.param_count(1), 2 + 3);
    }
}
