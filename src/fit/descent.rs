//! Per-parameter coordinate descent.
//!
//! For every parameter in turn:
//! - estimate `∂cost/∂p` by central differences
//! - try `p ← p − step/gradient`
//! - keep the move if the cost dropped, otherwise revert and halve `step`
//!
//! This is best-effort local refinement, not a convergent method: the update
//! divides by the gradient, so steep directions take small moves and flat ones
//! large moves. Use it to polish a reasonable starting point.

use crate::domain::OptimizerConfig;
use crate::fit::{Action, Event, LeastSquaresProblem, Observer, Solution, Status};

/// Gradients smaller than this are too noisy to divide by; the parameter is
/// left alone for the iteration.
const MIN_GRADIENT: f64 = 1e-12;

/// Run coordinate descent from `initial`.
///
/// Stops when the gradient norm drops below `config.cd_gradient_tol`, after
/// `config.cd_max_iter` outer iterations, or when the observer asks.
///
/// A non-finite objective is never reported as convergence: a non-finite
/// starting cost returns `Status::Stalled` at once, and a small gradient norm
/// in an iteration that also met a non-finite gradient ends as `Stalled` too.
/// Trial points with a non-finite cost are always rejected, so the returned
/// parameters are the best finite ones visited.
pub fn coordinate_descent<P, O>(
    problem: &mut P,
    initial: &[f64],
    config: &OptimizerConfig,
    observer: &mut O,
) -> Solution
where
    P: LeastSquaresProblem,
    O: for<'a> Observer<Event<'a>, Action>,
{
    let h = config.cd_perturbation;
    let mut params = initial.to_vec();
    let mut steps = vec![config.cd_initial_step; params.len()];

    let initial_cost = problem.cost(&params);
    let mut cost = initial_cost;
    if !initial_cost.is_finite() {
        return finish(params, initial_cost, cost, 0, Status::Stalled);
    }

    for iter in 1..=config.cd_max_iter {
        let mut gradient_sq = 0.0;
        let mut non_finite = false;

        for j in 0..params.len() {
            let original = params[j];

            params[j] = original + h;
            let up = problem.cost(&params);
            params[j] = original - h;
            let down = problem.cost(&params);
            params[j] = original;

            let gradient = (up - down) / (2.0 * h);
            if !gradient.is_finite() {
                non_finite = true;
                continue;
            }
            if gradient.abs() < MIN_GRADIENT {
                continue;
            }
            gradient_sq += gradient * gradient;

            params[j] = original - steps[j] / gradient;
            let trial = problem.cost(&params);
            if trial < cost {
                cost = trial;
            } else {
                params[j] = original;
                steps[j] *= 0.5;
            }
        }

        let event = Event {
            iter,
            cost,
            params: &params,
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            return finish(params, initial_cost, cost, iter, Status::StoppedByObserver);
        }

        if gradient_sq.sqrt() < config.cd_gradient_tol {
            let status = if non_finite {
                Status::Stalled
            } else {
                Status::SmallGradient
            };
            return finish(params, initial_cost, cost, iter, status);
        }
    }

    finish(
        params,
        initial_cost,
        cost,
        config.cd_max_iter,
        Status::MaxIters,
    )
}

fn finish(params: Vec<f64>, initial_cost: f64, cost: f64, iters: usize, status: Status) -> Solution {
    log::debug!("coordinate descent: {status:?} after {iters} iterations, cost {initial_cost:.3e} -> {cost:.3e}");
    Solution {
        params,
        initial_cost,
        cost,
        iters,
        status,
    }
}
