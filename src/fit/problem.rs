//! The seam between the optimizers and whatever they refine.

use nalgebra::DVector;
use serde::Serialize;

/// A least-squares objective over a flat parameter vector.
///
/// Implementors may mutate internal state on every call (a titration model
/// recomputes its prediction tables), so callers must re-apply the final
/// parameters once an optimizer returns.
pub trait LeastSquaresProblem {
    /// Residuals (predicted − observed) at `params`.
    fn residuals(&mut self, params: &[f64]) -> DVector<f64>;

    /// Sum of squared residuals at `params`.
    fn cost(&mut self, params: &[f64]) -> f64 {
        self.residuals(params).norm_squared()
    }
}

/// Why an optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Gradient norm fell below tolerance.
    SmallGradient,
    /// Relative step fell below tolerance.
    SmallStep,
    /// Residual norm fell below tolerance.
    SmallResidual,
    /// Iteration budget exhausted.
    MaxIters,
    /// No usable step: damping ran away or the objective went non-finite.
    Stalled,
    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

impl Status {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            Status::SmallGradient | Status::SmallStep | Status::SmallResidual
        )
    }
}

/// Result of one optimizer run.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub params: Vec<f64>,
    pub initial_cost: f64,
    pub cost: f64,
    pub iters: usize,
    pub status: Status,
}
