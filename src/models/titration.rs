//! A binding model bound to one dataset.
//!
//! `TitrationModel` owns the fit parameters (log constants, pure and complex
//! signals), the active-channel mask and the prediction/residual tables. Every
//! parameter change goes through `calculate_signal`, which rebuilds both tables
//! in full.
//!
//! Optimizers never touch the stored values directly. They work on a flat
//! parameter vector (`parameters` / `evaluate` / `apply_parameters`) whose
//! layout is fixed by a `ParameterMask`:
//!
//! 1. log constants (when `mask.constants`)
//! 2. pure signals of active channels (when `mask.signals`)
//! 3. complex-0 signals of active channels, then complex-1 (when `mask.signals`)

use std::fmt;
use std::rc::Rc;

use nalgebra::{DMatrix, DVector};

use crate::domain::{Dataset, ModelKind, OptimizerConfig, PlotMode};
use crate::fit::{self, Action, Event, Observer, Solution};
use crate::models::{mix_signal, speciate};

/// log10(K) used to seed a 1:1 model.
pub const DEFAULT_LOG_K11: f64 = 4.0;

/// Which groups of parameters an optimizer may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterMask {
    pub constants: bool,
    pub signals: bool,
}

impl ParameterMask {
    pub const CONSTANTS: ParameterMask = ParameterMask {
        constants: true,
        signals: false,
    };
    pub const SIGNALS: ParameterMask = ParameterMask {
        constants: false,
        signals: true,
    };
    pub const ALL: ParameterMask = ParameterMask {
        constants: true,
        signals: true,
    };
}

/// Fired after every recalculation while repaint mode is on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recalculated {
    pub kind: ModelKind,
    /// Sum of squared residuals over active channels.
    pub total_error: f64,
}

type Listener = Box<dyn FnMut(&Recalculated)>;

pub struct TitrationModel {
    kind: ModelKind,
    dataset: Rc<Dataset>,
    log_constants: Vec<f64>,
    pure_signals: Vec<f64>,
    /// One vector per constant, each one value per channel.
    complex_signals: Vec<Vec<f64>>,
    active_signals: Vec<bool>,
    /// points × channels
    predicted: DMatrix<f64>,
    /// points × channels, predicted − observed
    residuals: DMatrix<f64>,
    repaint: bool,
    corrupt: bool,
    listeners: Vec<Listener>,
}

impl fmt::Debug for TitrationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TitrationModel")
            .field("kind", &self.kind)
            .field("log_constants", &self.log_constants)
            .field("pure_signals", &self.pure_signals)
            .field("complex_signals", &self.complex_signals)
            .field("active_signals", &self.active_signals)
            .field("corrupt", &self.corrupt)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TitrationModel {
    /// Build a model with its starting guess.
    ///
    /// Pure signals start at the first point's observations. The 1:1 model
    /// starts at `log K11 = 4` with the complex signal at the last point's
    /// observations. The two-complex models first fit a throwaway 1:1 model
    /// with `config` and seed their constants from its `K11`, falling back to
    /// the default when that seed leaves the model unphysical.
    pub fn new(kind: ModelKind, dataset: Rc<Dataset>, config: &OptimizerConfig) -> Self {
        match kind {
            ModelKind::OneOne => Self::seeded(kind, dataset, DEFAULT_LOG_K11),
            ModelKind::TwoOneOneOne | ModelKind::OneOneOneTwo => {
                let mut simple = Self::seeded(ModelKind::OneOne, Rc::clone(&dataset), DEFAULT_LOG_K11);
                simple.fit(config);
                log::debug!(
                    "{} seeded from 1:1 fit, log K11 = {:.4}",
                    kind.display_name(),
                    simple.log_constants[0]
                );
                Self::seeded_or_default(kind, dataset, simple.log_constants[0])
            }
        }
    }

    /// Build a model from the default seeds without fitting anything.
    ///
    /// Useful when every parameter is about to be overwritten.
    pub fn unfitted(kind: ModelKind, dataset: Rc<Dataset>) -> Self {
        Self::seeded(kind, dataset, DEFAULT_LOG_K11)
    }

    /// Seed from `log_k11` unless it is not finite or the seeded model is
    /// corrupt or has a non-finite error; then seed from `DEFAULT_LOG_K11`.
    fn seeded_or_default(kind: ModelKind, dataset: Rc<Dataset>, log_k11: f64) -> Self {
        if log_k11.is_finite() {
            let model = Self::seeded(kind, Rc::clone(&dataset), log_k11);
            if !model.corrupt && model.total_error().is_finite() {
                return model;
            }
        }
        log::warn!(
            "{}: 1:1 seed log K11 = {log_k11} gives no usable start, using {DEFAULT_LOG_K11}",
            kind.display_name()
        );
        Self::seeded(kind, dataset, DEFAULT_LOG_K11)
    }

    fn seeded(kind: ModelKind, dataset: Rc<Dataset>, log_k11: f64) -> Self {
        let first = dataset.first_signals().to_vec();
        let last = dataset.last_signals().to_vec();

        let (log_constants, complex_signals) = match kind {
            ModelKind::OneOne => (vec![log_k11], vec![last]),
            // [K21, K11]; H2G starts at the free-host response, HG at saturation.
            ModelKind::TwoOneOneOne => (vec![log_k11 / 2.0, log_k11], vec![first.clone(), last]),
            // [K11, K12]; HG starts halfway, HG2 at saturation.
            ModelKind::OneOneOneTwo => {
                let middle = first.iter().zip(&last).map(|(a, b)| (a + b) / 2.0).collect();
                (vec![log_k11 / 2.0, log_k11], vec![middle, last])
            }
        };

        let rows = dataset.data_points();
        let cols = dataset.signal_count();
        let mut model = Self {
            kind,
            dataset,
            log_constants,
            pure_signals: first,
            complex_signals,
            active_signals: vec![true; cols],
            predicted: DMatrix::zeros(rows, cols),
            residuals: DMatrix::zeros(rows, cols),
            repaint: false,
            corrupt: false,
            listeners: Vec::new(),
        };
        model.calculate_signal();
        model.repaint = true;
        model
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.display_name()
    }

    pub fn dataset(&self) -> &Rc<Dataset> {
        &self.dataset
    }

    pub fn constant_size(&self) -> usize {
        self.kind.constant_size()
    }

    pub fn data_points(&self) -> usize {
        self.dataset.data_points()
    }

    pub fn signal_count(&self) -> usize {
        self.dataset.signal_count()
    }

    /// log10 of each equilibrium constant, in storage order.
    pub fn constants(&self) -> &[f64] {
        &self.log_constants
    }

    /// Replace the log constants and recalculate. A list of the wrong length
    /// is ignored.
    pub fn set_constants(&mut self, list: &[f64]) {
        if list.len() != self.log_constants.len() {
            return;
        }
        self.log_constants.copy_from_slice(list);
        self.calculate_signal();
    }

    /// Pure response of channel `i`, or 0 when out of range.
    pub fn pure_signal(&self, i: usize) -> f64 {
        self.pure_signals.get(i).copied().unwrap_or(0.0)
    }

    pub fn pure_signals(&self) -> &[f64] {
        &self.pure_signals
    }

    /// Replace the pure responses and recalculate. A list of the wrong length
    /// is ignored.
    pub fn set_pure_signals(&mut self, list: &[f64]) {
        if list.len() != self.pure_signals.len() {
            return;
        }
        self.pure_signals.copy_from_slice(list);
        self.calculate_signal();
    }

    pub fn complex_signals(&self, which: usize) -> Option<&[f64]> {
        self.complex_signals.get(which).map(Vec::as_slice)
    }

    /// Replace the responses of complex `which` and recalculate. Ignored when
    /// `which` is out of range or the list has the wrong length.
    pub fn set_complex_signals(&mut self, list: &[f64], which: usize) {
        let Some(target) = self.complex_signals.get_mut(which) else {
            return;
        };
        if list.len() != target.len() {
            return;
        }
        target.copy_from_slice(list);
        self.calculate_signal();
    }

    /// `(log constant, complex response)` for display; `(0, 0)` when either
    /// index is out of range.
    pub fn pair(&self, complex: usize, channel: usize) -> (f64, f64) {
        match (
            self.log_constants.get(complex),
            self.complex_signals.get(complex).and_then(|s| s.get(channel)),
        ) {
            (Some(&k), Some(&s)) => (k, s),
            _ => (0.0, 0.0),
        }
    }

    /// Pure signals followed by each complex signal vector.
    pub fn all_signals(&self) -> Vec<Vec<f64>> {
        std::iter::once(self.pure_signals.clone())
            .chain(self.complex_signals.iter().cloned())
            .collect()
    }

    pub fn active_signals(&self) -> &[bool] {
        &self.active_signals
    }

    /// Replace the active-channel mask. A mask of the wrong length is ignored.
    pub fn set_active_signals(&mut self, mask: &[bool]) {
        if mask.len() != self.active_signals.len() {
            return;
        }
        self.active_signals.copy_from_slice(mask);
    }

    pub fn repaint(&self) -> bool {
        self.repaint
    }

    pub fn set_repaint(&mut self, repaint: bool) {
        self.repaint = repaint;
    }

    /// Register a callback for `Recalculated` events.
    pub fn on_recalculated(&mut self, listener: impl FnMut(&Recalculated) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Whether the last recalculation hit an unphysical equilibrium.
    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }

    /// Recompute predictions and residuals from the stored parameters.
    pub fn calculate_signal(&mut self) {
        let constants = self.log_constants.clone();
        self.calculate_signal_with(&constants);
    }

    /// Recompute predictions and residuals using `log_constants` for the
    /// equilibrium, without storing them. Falls back to the stored constants
    /// when the length is wrong.
    pub fn calculate_signal_with(&mut self, log_constants: &[f64]) {
        let constants = if log_constants.len() == self.log_constants.len() {
            log_constants.to_vec()
        } else {
            self.log_constants.clone()
        };

        let mut unphysical = 0;
        for i in 0..self.data_points() {
            let (host_0, guest_0) = self.dataset.initial_concentrations(i);
            let speciation = speciate(self.kind, host_0, guest_0, &constants);
            if !speciation.is_physical(host_0, guest_0) {
                unphysical += 1;
            }

            for channel in 0..self.signal_count() {
                let complex = [
                    self.complex_value(0, channel),
                    self.complex_value(1, channel),
                ];
                let value = mix_signal(
                    self.kind,
                    &speciation,
                    host_0,
                    self.pure_signals[channel],
                    complex,
                );
                self.set_signal(i, channel, value);
            }
        }

        self.corrupt = unphysical > 0;
        if self.corrupt {
            log::debug!(
                "{}: {unphysical} point(s) with unphysical speciation at log K = {constants:?}",
                self.name()
            );
        }

        if self.repaint {
            let event = Recalculated {
                kind: self.kind,
                total_error: self.total_error(),
            };
            for listener in &mut self.listeners {
                listener(&event);
            }
        }
    }

    fn complex_value(&self, which: usize, channel: usize) -> f64 {
        self.complex_signals
            .get(which)
            .map_or(0.0, |signals| signals[channel])
    }

    fn set_signal(&mut self, point: usize, channel: usize, value: f64) {
        self.predicted[(point, channel)] = value;
        self.residuals[(point, channel)] = value - self.dataset.observed(point, channel);
    }

    pub fn predicted(&self) -> &DMatrix<f64> {
        &self.predicted
    }

    pub fn residuals(&self) -> &DMatrix<f64> {
        &self.residuals
    }

    /// Sum of squared residuals for one channel. Out-of-range and inactive
    /// channels contribute 0.
    pub fn sum_of_errors(&self, channel: usize) -> f64 {
        if channel >= self.signal_count() || !self.active_signals[channel] {
            return 0.0;
        }
        self.residuals.column(channel).norm_squared()
    }

    /// Sum of squared residuals over every active channel.
    pub fn total_error(&self) -> f64 {
        (0..self.signal_count()).map(|c| self.sum_of_errors(c)).sum()
    }

    /// Number of residuals that enter the objective.
    pub fn active_observations(&self) -> usize {
        self.active_signals.iter().filter(|&&a| a).count() * self.data_points()
    }

    /// Independent-axis value for point `i`.
    pub fn x_value(&self, i: usize, mode: PlotMode) -> f64 {
        self.dataset.x_value(i, mode)
    }

    /// Channel-major residual vector (`channels × points`). Inactive channels
    /// are zero.
    pub fn residual_vector(&self) -> DVector<f64> {
        let rows = self.data_points();
        let cols = self.signal_count();
        DVector::from_fn(rows * cols, |k, _| {
            let (channel, point) = (k / rows, k % rows);
            if self.active_signals[channel] {
                self.residuals[(point, channel)]
            } else {
                0.0
            }
        })
    }

    /// Current values of the parameters selected by `mask`, in layout order.
    pub fn parameters(&self, mask: ParameterMask) -> Vec<f64> {
        let mut out = Vec::new();
        if mask.constants {
            out.extend_from_slice(&self.log_constants);
        }
        if mask.signals {
            let active: Vec<usize> = self.active_channels().collect();
            out.extend(active.iter().map(|&c| self.pure_signals[c]));
            for signals in &self.complex_signals {
                out.extend(active.iter().map(|&c| signals[c]));
            }
        }
        out
    }

    /// Store `params` (laid out as by `parameters(mask)`) and recalculate.
    /// A vector of the wrong length is ignored.
    pub fn apply_parameters(&mut self, mask: ParameterMask, params: &[f64]) {
        if params.len() != self.parameters(mask).len() {
            return;
        }

        let mut values = params.iter().copied();
        if mask.constants {
            for k in &mut self.log_constants {
                *k = values.next().unwrap_or(*k);
            }
        }
        if mask.signals {
            let active: Vec<usize> = self.active_channels().collect();
            for &c in &active {
                self.pure_signals[c] = values.next().unwrap_or(self.pure_signals[c]);
            }
            for signals in &mut self.complex_signals {
                for &c in &active {
                    signals[c] = values.next().unwrap_or(signals[c]);
                }
            }
        }
        self.calculate_signal();
    }

    /// Apply `params` and return the resulting residual vector.
    pub fn evaluate(&mut self, mask: ParameterMask, params: &[f64]) -> DVector<f64> {
        self.apply_parameters(mask, params);
        self.residual_vector()
    }

    fn active_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.active_signals
            .iter()
            .enumerate()
            .filter_map(|(i, &active)| active.then_some(i))
    }

    /// Coordinate descent on the constants only.
    pub fn minimize_constants(&mut self, config: &OptimizerConfig) -> Solution {
        fit::minimize(self, ParameterMask::CONSTANTS, config, &mut ())
    }

    /// Coordinate descent on the pure and complex signals only.
    pub fn minimize_signals(&mut self, config: &OptimizerConfig) -> Solution {
        fit::minimize(self, ParameterMask::SIGNALS, config, &mut ())
    }

    /// Joint Levenberg-Marquardt refinement of every parameter.
    ///
    /// Returns the refined log constants along with the solver outcome.
    pub fn levenberg_marquardt<O>(
        &mut self,
        config: &OptimizerConfig,
        max_iter: usize,
        observer: &mut O,
    ) -> (Vec<f64>, Solution)
    where
        O: for<'a> Observer<Event<'a>, Action>,
    {
        let solution = fit::solve_least_squares(self, ParameterMask::ALL, config, max_iter, observer);
        (self.log_constants.clone(), solution)
    }

    /// Full fit with the configured strategy.
    pub fn fit(&mut self, config: &OptimizerConfig) -> fit::FitOutcome {
        fit::fit_model(self, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MeasurementPoint;
    use std::cell::RefCell;

    fn dataset() -> Rc<Dataset> {
        let points = vec![
            MeasurementPoint::new(1e-3, 0.0, vec![0.0, 1.0]),
            MeasurementPoint::new(1e-3, 1e-3, vec![0.5, 1.5]),
            MeasurementPoint::new(1e-3, 4e-3, vec![0.9, 1.9]),
        ];
        Rc::new(Dataset::new(points).unwrap())
    }

    #[test]
    fn seeds_follow_first_and_last_points() {
        let model = TitrationModel::unfitted(ModelKind::OneOne, dataset());
        assert_eq!(model.constants(), &[4.0]);
        assert_eq!(model.pure_signals(), &[0.0, 1.0]);
        assert_eq!(model.complex_signals(0), Some(&[0.9, 1.9][..]));

        let model = TitrationModel::unfitted(ModelKind::OneOneOneTwo, dataset());
        assert_eq!(model.constants(), &[2.0, 4.0]);
        assert_eq!(model.complex_signals(0), Some(&[0.45, 1.45][..]));
        assert_eq!(model.complex_signals(1), Some(&[0.9, 1.9][..]));

        let model = TitrationModel::unfitted(ModelKind::TwoOneOneOne, dataset());
        assert_eq!(model.complex_signals(0), Some(&[0.0, 1.0][..]));
        assert_eq!(model.complex_signals(1), Some(&[0.9, 1.9][..]));
    }

    #[test]
    fn wrong_length_setters_are_ignored() {
        let mut model = TitrationModel::unfitted(ModelKind::TwoOneOneOne, dataset());
        model.set_constants(&[1.0]);
        model.set_pure_signals(&[1.0, 2.0, 3.0]);
        model.set_complex_signals(&[1.0], 0);
        model.set_complex_signals(&[1.0, 2.0], 5);
        model.set_active_signals(&[true]);

        assert_eq!(model.constants(), &[2.0, 4.0]);
        assert_eq!(model.pure_signals(), &[0.0, 1.0]);
        assert_eq!(model.complex_signals(0), Some(&[0.0, 1.0][..]));
        assert_eq!(model.active_signals(), &[true, true]);
    }

    #[test]
    fn setters_recalculate_predictions() {
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, dataset());
        let before = model.predicted().clone();

        model.set_constants(&[2.0]);
        assert_ne!(model.predicted(), &before);

        model.set_pure_signals(&[5.0, 5.0]);
        assert_eq!(model.predicted()[(0, 0)], 5.0);
        assert_eq!(model.residuals()[(0, 1)], 4.0);

        model.set_complex_signals(&[0.0, 0.0], 0);
        let settled = model.predicted().clone();
        model.calculate_signal();
        assert_eq!(model.predicted(), &settled);
    }

    #[test]
    fn wrong_length_setters_do_not_notify() {
        let count = Rc::new(RefCell::new(0));
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, dataset());
        let sink = Rc::clone(&count);
        model.on_recalculated(move |_| *sink.borrow_mut() += 1);

        model.set_constants(&[1.0, 2.0]);
        model.set_complex_signals(&[1.0, 2.0], 1);
        assert_eq!(*count.borrow(), 0);

        model.set_constants(&[3.0]);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn unusable_one_one_seed_falls_back_to_default() {
        for kind in [ModelKind::TwoOneOneOne, ModelKind::OneOneOneTwo] {
            for log_k11 in [126.34, f64::NAN] {
                let model = TitrationModel::seeded_or_default(kind, dataset(), log_k11);
                assert_eq!(model.constants(), &[2.0, 4.0]);
                assert!(!model.is_corrupt());
                assert!(model.total_error().is_finite());
            }
        }

        let model = TitrationModel::seeded_or_default(ModelKind::TwoOneOneOne, dataset(), 3.0);
        assert_eq!(model.constants(), &[1.5, 3.0]);
    }

    #[test]
    fn residuals_are_predicted_minus_observed() {
        let model = TitrationModel::unfitted(ModelKind::OneOne, dataset());
        let data = model.dataset().clone();
        for i in 0..model.data_points() {
            for c in 0..model.signal_count() {
                assert_eq!(
                    model.residuals()[(i, c)],
                    model.predicted()[(i, c)] - data.observed(i, c)
                );
            }
        }
        // No guest at the first point: prediction is the pure signal.
        assert_eq!(model.residuals()[(0, 0)], 0.0);
    }

    #[test]
    fn inactive_channels_leave_the_objective() {
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, dataset());
        let both = model.total_error();
        model.set_active_signals(&[true, false]);

        assert_eq!(model.sum_of_errors(1), 0.0);
        assert_eq!(model.total_error(), model.sum_of_errors(0));
        assert!(model.total_error() <= both);
        assert_eq!(model.parameters(ParameterMask::ALL).len(), 1 + 2);

        let residuals = model.residual_vector();
        assert_eq!(residuals.len(), 6);
        assert!(residuals.rows(3, 3).iter().all(|&r| r == 0.0));
        assert_eq!(residuals[1], model.residuals()[(1, 0)]);
    }

    #[test]
    fn apply_parameters_round_trips_layout() {
        let mut model = TitrationModel::unfitted(ModelKind::OneOneOneTwo, dataset());
        let params = vec![3.0, 5.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        model.apply_parameters(ParameterMask::ALL, &params);

        assert_eq!(model.constants(), &[3.0, 5.0]);
        assert_eq!(model.pure_signals(), &[0.1, 0.2]);
        assert_eq!(model.complex_signals(0), Some(&[0.3, 0.4][..]));
        assert_eq!(model.complex_signals(1), Some(&[0.5, 0.6][..]));
        assert_eq!(model.parameters(ParameterMask::ALL), params);
        assert_eq!(model.pair(1, 1), (5.0, 0.6));
        assert_eq!(model.pair(2, 0), (0.0, 0.0));
    }

    #[test]
    fn repaint_controls_notifications() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, dataset());
        let sink = Rc::clone(&seen);
        model.on_recalculated(move |event| sink.borrow_mut().push(event.total_error));

        model.calculate_signal();
        model.set_repaint(false);
        model.calculate_signal();

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0], model.total_error());
    }

    #[test]
    fn absurd_constants_mark_model_corrupt() {
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, dataset());
        assert!(!model.is_corrupt());
        model.set_constants(&[f64::NAN]);
        assert!(model.is_corrupt());
    }
}
