//! 1:1 and 1:2 complexes coexisting: H + G ⇌ HG, HG + G ⇌ HG2.
//!
//! Constants are stored as `[K11, K12]`; complex slot 0 is HG, slot 1 is HG2.

use crate::math::min_cubic_root;
use crate::models::Speciation;

/// Free guest from the guest mass-balance cubic, then free host and complexes.
pub fn speciate(host_0: f64, guest_0: f64, log_k11: f64, log_k12: f64) -> Speciation {
    let k11 = 10f64.powf(log_k11);
    let k12 = 10f64.powf(log_k12);

    let a = k11 * k12;
    let b = k11 * (2.0 * k12 * host_0 - k12 * guest_0 + 1.0);
    let c = k11 * (host_0 - guest_0) + 1.0;
    let guest = min_cubic_root(a, b, c, -guest_0);

    let host = host_0 / (1.0 + k11 * guest + k11 * k12 * guest * guest);
    let hg = k11 * host * guest;
    let hg2 = k11 * k12 * host * guest * guest;

    Speciation {
        host,
        guest,
        complexes: [hg, hg2],
    }
}

/// `H/H0·pure + HG/H0·δ(HG) + HG2/H0·δ(HG2)`.
pub fn signal(s: &Speciation, host_0: f64, pure: f64, complex: [f64; 2]) -> f64 {
    s.host / host_0 * pure + s.complexes[0] / host_0 * complex[0] + s.complexes[1] / host_0 * complex[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn balances_host_and_guest() {
        let (h0, g0) = (1e-3, 3e-3);
        let s = speciate(h0, g0, 4.0, 2.0);
        assert!(s.is_physical(h0, g0));
        // H0 = H + HG + HG2, G0 = G + HG + 2·HG2
        assert_relative_eq!(s.host + s.complexes[0] + s.complexes[1], h0, max_relative = 1e-9);
        assert_relative_eq!(s.guest + s.complexes[0] + 2.0 * s.complexes[1], g0, max_relative = 1e-5);
    }

    #[test]
    fn zero_guest_leaves_host_free() {
        let s = speciate(1e-3, 0.0, 4.0, 2.0);
        assert_relative_eq!(s.host, 1e-3, max_relative = 1e-6);
        assert!(s.complexes[0].abs() < 1e-9);
        assert!(s.is_physical(1e-3, 0.0));
    }
}
