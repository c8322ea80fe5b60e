//! Running the optimizers against a `TitrationModel`.
//!
//! Every entry point follows the same pattern:
//! - switch repaint off so listeners do not see intermediate trial states
//! - let the optimizer drive `evaluate` through a `ModelObjective`
//! - re-apply the returned parameters and restore repaint (one final
//!   notification if it was on)

use nalgebra::DVector;
use serde::Serialize;

use crate::domain::{ModelKind, OptimizerConfig, Strategy};
use crate::fit::{
    coordinate_descent, levenberg_marquardt, Action, Event, LeastSquaresProblem, Observer,
    Solution, Status,
};
use crate::models::{ParameterMask, TitrationModel};

/// A model viewed as a least-squares problem over the parameters in `mask`.
pub struct ModelObjective<'a> {
    model: &'a mut TitrationModel,
    mask: ParameterMask,
}

impl<'a> ModelObjective<'a> {
    pub fn new(model: &'a mut TitrationModel, mask: ParameterMask) -> Self {
        Self { model, mask }
    }
}

impl LeastSquaresProblem for ModelObjective<'_> {
    fn residuals(&mut self, params: &[f64]) -> DVector<f64> {
        self.model.evaluate(self.mask, params)
    }

    /// Unphysical speciation costs `+inf`, so coordinate descent never
    /// accepts a trial point that leaves `[0, total]`.
    fn cost(&mut self, params: &[f64]) -> f64 {
        let residuals = self.residuals(params);
        if self.model.is_corrupt() {
            f64::INFINITY
        } else {
            residuals.norm_squared()
        }
    }
}

/// Summary of a full fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitOutcome {
    pub kind: ModelKind,
    pub strategy: Strategy,
    pub status: Status,
    /// Optimizer iterations summed over every stage.
    pub iters: usize,
    pub initial_error: f64,
    pub total_error: f64,
    pub corrupt: bool,
}

/// Coordinate descent over the parameters in `mask`.
pub fn minimize<O>(
    model: &mut TitrationModel,
    mask: ParameterMask,
    config: &OptimizerConfig,
    observer: &mut O,
) -> Solution
where
    O: for<'a> Observer<Event<'a>, Action>,
{
    with_repaint_suspended(model, mask, |problem, initial| {
        coordinate_descent(problem, initial, config, observer)
    })
}

/// Levenberg-Marquardt over the parameters in `mask`.
pub fn solve_least_squares<O>(
    model: &mut TitrationModel,
    mask: ParameterMask,
    config: &OptimizerConfig,
    max_iter: usize,
    observer: &mut O,
) -> Solution
where
    O: for<'a> Observer<Event<'a>, Action>,
{
    with_repaint_suspended(model, mask, |problem, initial| {
        levenberg_marquardt(problem, initial, config, max_iter, observer)
    })
}

fn with_repaint_suspended<F>(model: &mut TitrationModel, mask: ParameterMask, run: F) -> Solution
where
    F: FnOnce(&mut ModelObjective<'_>, &[f64]) -> Solution,
{
    let repaint = model.repaint();
    model.set_repaint(false);

    let initial = model.parameters(mask);
    let solution = run(&mut ModelObjective::new(model, mask), &initial);

    model.apply_parameters(mask, &solution.params);
    model.set_repaint(repaint);
    if repaint {
        model.calculate_signal();
    }
    solution
}

/// Fit every parameter of `model` with the configured strategy.
///
/// `Strategy::Descent` alternates constants-only and signals-only coordinate
/// descent for up to `config.fit_cycles` rounds, stopping early once a round
/// no longer lowers the error. The model ends on the best finite parameters
/// seen.
///
/// A fit whose final error is not finite reports `Status::Stalled`.
pub fn fit_model(model: &mut TitrationModel, config: &OptimizerConfig) -> FitOutcome {
    let initial_error = model.total_error();

    let (mut status, iters) = match config.strategy {
        Strategy::Levmar => {
            let solution = solve_least_squares(model, ParameterMask::ALL, config, config.max_iter, &mut ());
            (solution.status, solution.iters)
        }
        Strategy::Descent => alternate_descent(model, config, initial_error),
    };
    if !model.total_error().is_finite() {
        status = Status::Stalled;
    }

    let outcome = FitOutcome {
        kind: model.kind(),
        strategy: config.strategy,
        status,
        iters,
        initial_error,
        total_error: model.total_error(),
        corrupt: model.is_corrupt(),
    };

    if outcome.corrupt {
        log::warn!(
            "{}: fit ended with unphysical speciation at log K = {:?}",
            model.name(),
            model.constants()
        );
    }
    log::info!(
        "{}: {:?} after {} iterations, SSE {:.4e} -> {:.4e}",
        model.name(),
        outcome.status,
        outcome.iters,
        outcome.initial_error,
        outcome.total_error
    );
    outcome
}

fn alternate_descent(
    model: &mut TitrationModel,
    config: &OptimizerConfig,
    initial_error: f64,
) -> (Status, usize) {
    let mut iters = 0;
    let mut status = Status::MaxIters;
    let mut best_params = model.parameters(ParameterMask::ALL);
    let mut best_error = initial_error;

    for cycle in 1..=config.fit_cycles {
        let constants = model.minimize_constants(config);
        let signals = model.minimize_signals(config);
        iters += constants.iters + signals.iters;
        status = if constants.status == Status::Stalled {
            Status::Stalled
        } else {
            signals.status
        };

        let error = model.total_error();
        log::trace!("{} descent cycle {cycle}: error {error:.6e}", model.name());
        let improved = error.is_finite() && (!best_error.is_finite() || error < best_error);
        if !improved {
            model.apply_parameters(ParameterMask::ALL, &best_params);
            break;
        }
        best_params = model.parameters(ParameterMask::ALL);
        best_error = error;
    }
    (status, iters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dataset, MeasurementPoint};
    use std::cell::Cell;
    use std::rc::Rc;

    /// 1:1 data with log K = 4, pure 0 and complex 1.
    fn one_one_dataset() -> Rc<Dataset> {
        let observed = [0.0, 0.813579192629976, 0.9397674732957373, 0.9653339423005001, 0.9757531487308458];
        let points = observed
            .iter()
            .enumerate()
            .map(|(i, &y)| MeasurementPoint::new(1e-3, i as f64 * 1.25e-3, vec![y]))
            .collect();
        Rc::new(Dataset::new(points).unwrap())
    }

    #[test]
    fn constants_only_leaves_signals_alone() {
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, one_one_dataset());
        model.set_constants(&[3.0]);
        model.set_pure_signals(&[0.0]);
        model.set_complex_signals(&[1.0], 0);

        let solution = model.minimize_constants(&OptimizerConfig::default());
        assert_eq!(solution.params.len(), 1);
        assert_eq!(model.pure_signals(), &[0.0]);
        assert_eq!(model.complex_signals(0), Some(&[1.0][..]));
        assert!((model.constants()[0] - 4.0).abs() < 1e-2);
    }

    #[test]
    fn one_notification_per_optimizer_run() {
        let count = Rc::new(Cell::new(0));
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, one_one_dataset());
        let sink = Rc::clone(&count);
        model.on_recalculated(move |_| sink.set(sink.get() + 1));

        model.minimize_signals(&OptimizerConfig::default());
        assert_eq!(count.get(), 1);
        assert!(model.repaint());
    }

    #[test]
    fn descent_rejects_unphysical_constants() {
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, one_one_dataset());
        let mut objective = ModelObjective::new(&mut model, ParameterMask::CONSTANTS);
        assert!(objective.cost(&[4.0]).is_finite());
        assert_eq!(objective.cost(&[f64::NAN]), f64::INFINITY);
    }

    #[test]
    fn descent_from_unphysical_start_is_stalled() {
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, one_one_dataset());
        model.set_constants(&[f64::NAN]);
        let before = model.parameters(ParameterMask::ALL);

        let config = OptimizerConfig {
            strategy: Strategy::Descent,
            ..OptimizerConfig::default()
        };
        let outcome = model.fit(&config);

        assert_eq!(outcome.status, Status::Stalled);
        assert!(!outcome.status.is_converged());
        assert!(outcome.corrupt);
        let after = model.parameters(ParameterMask::ALL);
        assert!(after[0].is_nan());
        assert_eq!(after[1..], before[1..]);
    }

    #[test]
    fn levmar_fit_reports_convergence() {
        let mut model = TitrationModel::unfitted(ModelKind::OneOne, one_one_dataset());
        let outcome = model.fit(&OptimizerConfig::default());
        assert!(outcome.status.is_converged());
        assert!(outcome.total_error < 1e-12);
        assert!(outcome.total_error < outcome.initial_error);
        assert!(!outcome.corrupt);
    }
}
