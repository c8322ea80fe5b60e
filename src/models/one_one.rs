//! 1:1 binding: H + G ⇌ HG.

use crate::math::try_min_quadratic_root;
use crate::models::Speciation;

/// Solve the 1:1 mass balance for point `(host_0, guest_0)`.
///
/// The complex concentration `x` is the smaller root of
/// `K·x² − (K·H0 + K·G0 + 1)·x + K·G0·H0 = 0`; free host and guest follow
/// from the mass balances. When the quadratic has no usable root (a
/// non-finite or overflowing `K`) every concentration is NaN, which
/// `Speciation::is_physical` rejects.
pub fn speciate(host_0: f64, guest_0: f64, log_k11: f64) -> Speciation {
    let k11 = 10f64.powf(log_k11);
    let a = k11;
    let b = -(k11 * host_0 + k11 * guest_0 + 1.0);
    let c = k11 * guest_0 * host_0;
    let complex = try_min_quadratic_root(a, b, c).unwrap_or_else(|err| {
        log::trace!("1:1 speciation at H0 = {host_0}, G0 = {guest_0}: {err}");
        f64::NAN
    });

    Speciation {
        host: host_0 - complex,
        guest: guest_0 - complex,
        complexes: [complex, 0.0],
    }
}

/// Host-normalised signal: `H/H0·pure + HG/H0·δ(HG)`.
pub fn signal(s: &Speciation, host_0: f64, pure: f64, complex: [f64; 2]) -> f64 {
    s.host / host_0 * pure + s.complexes[0] / host_0 * complex[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn satisfies_mass_action() {
        let (h0, g0, log_k) = (1e-3, 2e-3, 4.0);
        let s = speciate(h0, g0, log_k);
        assert_relative_eq!(s.complexes[0] / (s.host * s.guest), 1e4, max_relative = 1e-8);
        assert_relative_eq!(s.host + s.complexes[0], h0, max_relative = 1e-12);
        assert!(s.is_physical(h0, g0));
    }

    #[test]
    fn overflowing_constant_is_unphysical() {
        for log_k in [400.0, f64::NAN] {
            let s = speciate(1e-3, 1e-3, log_k);
            assert!(s.complexes[0].is_nan());
            assert!(!s.is_physical(1e-3, 1e-3));
        }
    }

    #[test]
    fn no_guest_means_no_complex() {
        let s = speciate(1e-3, 0.0, 4.0);
        assert_eq!(s.complexes[0], 0.0);
        assert_eq!(s.host, 1e-3);
        assert_eq!(signal(&s, 1e-3, 0.25, [1.0, 0.0]), 0.25);
    }
}
