//! Levenberg-Marquardt over a flat parameter vector.
//!
//! The Jacobian is taken by forward differences; the damping follows
//! Nielsen's update, starting from `lm_tau · max diag(JᵀJ)`.
//!
//! Stopping rules, checked in this order each iteration:
//! - `‖Jᵀr‖∞ ≤ lm_eps1`
//! - `‖r‖² ≤ lm_eps3`
//! - `‖δ‖ ≤ lm_eps2 · (‖p‖ + lm_eps2)`
//! - iteration budget, observer request, or runaway damping

use nalgebra::{DMatrix, DVector};

use crate::domain::OptimizerConfig;
use crate::fit::{Action, Event, LeastSquaresProblem, Observer, Solution, Status};

/// Damping above this means no descent direction is being found.
const DAMPING_MAX: f64 = 1e30;

/// Relative finite-difference step; `lm_delta` is the absolute floor.
const RELATIVE_DELTA: f64 = 1e-4;

/// Refine `initial` for at most `max_iter` iterations.
pub fn levenberg_marquardt<P, O>(
    problem: &mut P,
    initial: &[f64],
    config: &OptimizerConfig,
    max_iter: usize,
    observer: &mut O,
) -> Solution
where
    P: LeastSquaresProblem,
    O: for<'a> Observer<Event<'a>, Action>,
{
    let mut p = DVector::from_column_slice(initial);
    let mut r = problem.residuals(p.as_slice());
    let initial_cost = r.norm_squared();
    let mut cost = initial_cost;

    let mut jac = jacobian(problem, &p, &r, config.lm_delta);
    let mut jtj = jac.transpose() * &jac;
    let mut g = jac.transpose() * &r;

    let mut mu = config.lm_tau * jtj.diagonal().max();
    let mut nu = 2.0;

    for iter in 1..=max_iter {
        let event = Event {
            iter,
            cost,
            params: p.as_slice(),
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            return finish(p, initial_cost, cost, iter, Status::StoppedByObserver);
        }

        if g.amax() <= config.lm_eps1 {
            return finish(p, initial_cost, cost, iter, Status::SmallGradient);
        }
        if cost <= config.lm_eps3 {
            return finish(p, initial_cost, cost, iter, Status::SmallResidual);
        }

        let mut damped = jtj.clone();
        for i in 0..damped.nrows() {
            damped[(i, i)] += mu;
        }
        let Some(delta) = damped.cholesky().map(|c| c.solve(&(-&g))) else {
            mu *= nu;
            nu *= 2.0;
            if mu > DAMPING_MAX {
                return finish(p, initial_cost, cost, iter, Status::Stalled);
            }
            continue;
        };

        if delta.norm() <= config.lm_eps2 * (p.norm() + config.lm_eps2) {
            return finish(p, initial_cost, cost, iter, Status::SmallStep);
        }

        let candidate = &p + &delta;
        let r_new = problem.residuals(candidate.as_slice());
        let new_cost = r_new.norm_squared();
        let predicted = delta.dot(&(mu * &delta - &g));
        let rho = (cost - new_cost) / predicted;

        if new_cost.is_finite() && predicted > 0.0 && rho > 0.0 {
            log::trace!("levmar iter {iter}: cost {new_cost:.6e}, mu {mu:.3e}, rho {rho:.3}");
            p = candidate;
            r = r_new;
            cost = new_cost;
            jac = jacobian(problem, &p, &r, config.lm_delta);
            jtj = jac.transpose() * &jac;
            g = jac.transpose() * &r;
            mu *= (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
            nu = 2.0;
        } else {
            mu *= nu;
            nu *= 2.0;
            if mu > DAMPING_MAX {
                return finish(p, initial_cost, cost, iter, Status::Stalled);
            }
        }
    }

    finish(p, initial_cost, cost, max_iter, Status::MaxIters)
}

/// Forward-difference Jacobian around `p`, given `r = residuals(p)`.
fn jacobian<P: LeastSquaresProblem>(
    problem: &mut P,
    p: &DVector<f64>,
    r: &DVector<f64>,
    delta: f64,
) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(r.len(), p.len());
    let mut shifted = p.clone();
    for j in 0..p.len() {
        let d = (RELATIVE_DELTA * p[j]).abs().max(delta);
        shifted[j] = p[j] + d;
        let r_j = problem.residuals(shifted.as_slice());
        jac.set_column(j, &((r_j - r) / d));
        shifted[j] = p[j];
    }
    jac
}

fn finish(p: DVector<f64>, initial_cost: f64, cost: f64, iters: usize, status: Status) -> Solution {
    log::debug!("levmar: {status:?} after {iters} iterations, cost {initial_cost:.3e} -> {cost:.3e}");
    Solution {
        params: p.iter().copied().collect(),
        initial_cost,
        cost,
        iters,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Exponential decay `y = a·exp(−b·t)` sampled without noise.
    struct Decay {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl Decay {
        fn new(a: f64, b: f64) -> Self {
            let t: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
            let y = t.iter().map(|t| a * (-b * t).exp()).collect();
            Self { t, y }
        }
    }

    impl LeastSquaresProblem for Decay {
        fn residuals(&mut self, params: &[f64]) -> DVector<f64> {
            DVector::from_iterator(
                self.t.len(),
                self.t
                    .iter()
                    .zip(&self.y)
                    .map(|(t, y)| params[0] * (-params[1] * t).exp() - y),
            )
        }
    }

    #[test]
    fn recovers_exponential_decay() {
        let mut problem = Decay::new(2.0, 0.7);
        let config = OptimizerConfig::default();
        let solution = levenberg_marquardt(&mut problem, &[1.0, 0.2], &config, 200, &mut ());
        assert!(solution.status.is_converged(), "{:?}", solution.status);
        assert_abs_diff_eq!(solution.params[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(solution.params[1], 0.7, epsilon = 1e-6);
        assert!(solution.cost < 1e-12);
    }

    #[test]
    fn respects_iteration_budget() {
        let mut problem = Decay::new(2.0, 0.7);
        let config = OptimizerConfig::default();
        let solution = levenberg_marquardt(&mut problem, &[1.0, 0.2], &config, 1, &mut ());
        assert_eq!(solution.status, Status::MaxIters);
        assert_eq!(solution.iters, 1);
        assert!(solution.cost < solution.initial_cost);
    }

    #[test]
    fn observer_sees_every_iteration() {
        let mut problem = Decay::new(2.0, 0.7);
        let config = OptimizerConfig::default();
        let mut costs = Vec::new();
        let mut observer = |event: &Event<'_>| -> Option<Action> {
            costs.push(event.cost);
            None
        };
        let solution = levenberg_marquardt(&mut problem, &[1.0, 0.2], &config, 200, &mut observer);
        assert_eq!(costs.len(), solution.iters);
        assert!(costs.windows(2).all(|w| w[1] <= w[0]));
    }
}
