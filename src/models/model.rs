//! Model evaluation for the 1:1, 2:1/1:1 and 1:1/1:2 topologies.
//!
//! The fitting code relies on two primitive operations:
//! - solve the equilibrium for one point (`speciate`)
//! - mix the per-species signals into one observable (`mix_signal`)
//!
//! These are dispatched here for each model kind.

use crate::domain::ModelKind;
use crate::models::{one_one, one_two, two_one};

/// Relative slack allowed when checking that concentrations stay inside
/// `[0, total]`.
const RANGE_TOLERANCE: f64 = 1e-6;

/// Absolute slack on top of `RANGE_TOLERANCE`. The cubic searches stop at
/// `|f| < 1e-8`, which leaves roots near zero off by up to about that much.
const ROOT_SLACK: f64 = 1e-8;

/// Equilibrium concentrations at one titration point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speciation {
    /// Free host.
    pub host: f64,
    /// Free guest.
    pub guest: f64,
    /// Complex concentrations, slot `i` paired with constant `i`. Unused slots are 0.
    pub complexes: [f64; 2],
}

impl Speciation {
    /// Whether every concentration is finite and within `[0, total]`
    /// (up to solver tolerance).
    pub fn is_physical(&self, host_0: f64, guest_0: f64) -> bool {
        let slack = RANGE_TOLERANCE * host_0.max(guest_0) + ROOT_SLACK;
        let within = |x: f64, total: f64| x.is_finite() && x >= -slack && x <= total + slack;

        within(self.host, host_0)
            && within(self.guest, guest_0)
            && self
                .complexes
                .iter()
                .all(|&c| within(c, host_0.max(guest_0)))
    }
}

/// Solve the mass balances of `kind` for one point.
///
/// # Panics
/// Panics if `log_constants` is shorter than `kind.constant_size()`.
pub fn speciate(kind: ModelKind, host_0: f64, guest_0: f64, log_constants: &[f64]) -> Speciation {
    match kind {
        ModelKind::OneOne => one_one::speciate(host_0, guest_0, log_constants[0]),
        ModelKind::TwoOneOneOne => {
            two_one::speciate(host_0, guest_0, log_constants[0], log_constants[1])
        }
        ModelKind::OneOneOneTwo => {
            one_two::speciate(host_0, guest_0, log_constants[0], log_constants[1])
        }
    }
}

/// Observable for one channel given its pure and complex responses.
///
/// Without host (`host_0 <= 0`) the host-normalised fractions are undefined
/// and the pure response is returned.
pub fn mix_signal(
    kind: ModelKind,
    speciation: &Speciation,
    host_0: f64,
    pure: f64,
    complex: [f64; 2],
) -> f64 {
    if host_0 <= 0.0 {
        return pure;
    }
    match kind {
        ModelKind::OneOne => one_one::signal(speciation, host_0, pure, complex),
        ModelKind::TwoOneOneOne => two_one::signal(speciation, host_0, pure, complex),
        ModelKind::OneOneOneTwo => one_two::signal(speciation, host_0, pure, complex),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_host_returns_pure_signal() {
        for kind in ModelKind::ALL {
            let s = speciate(kind, 0.0, 1e-3, &[4.0, 2.0]);
            assert_eq!(mix_signal(kind, &s, 0.0, 0.7, [1.0, 2.0]), 0.7);
        }
    }

    #[test]
    fn saturated_one_one_approaches_complex_signal() {
        let s = speciate(ModelKind::OneOne, 1e-3, 1.0, &[6.0]);
        let y = mix_signal(ModelKind::OneOne, &s, 1e-3, 0.0, [1.0, 0.0]);
        assert!((y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn nan_concentrations_are_not_physical() {
        let s = Speciation {
            host: f64::NAN,
            guest: 0.0,
            complexes: [0.0, 0.0],
        };
        assert!(!s.is_physical(1e-3, 1e-3));
        let s = Speciation {
            host: 2e-3,
            guest: 0.0,
            complexes: [0.0, 0.0],
        };
        assert!(!s.is_physical(1e-3, 1e-3));
    }

    #[test]
    fn cubic_residue_at_zero_guest_is_physical() {
        // K11 = 1e2, K12 = 1e4 with no guest: the guest search stops a few
        // nM away from the exact root 0.
        let s = speciate(ModelKind::OneOneOneTwo, 1e-3, 0.0, &[2.0, 4.0]);
        assert!(s.guest > 0.0 && s.guest < 1e-8);
        assert!(s.is_physical(1e-3, 0.0));

        let off = Speciation {
            host: 1e-3,
            guest: 5e-8,
            complexes: [0.0, 0.0],
        };
        assert!(!off.is_physical(1e-3, 0.0));
    }
}
