//! 2:1 and 1:1 complexes coexisting: H + G ⇌ HG, HG + H ⇌ H2G.
//!
//! Constants are stored as `[K21, K11]`; complex slot 0 is H2G, slot 1 is HG.

use crate::math::min_cubic_root;
use crate::models::Speciation;

/// Free host from the host mass-balance cubic, then free guest and complexes.
pub fn speciate(host_0: f64, guest_0: f64, log_k21: f64, log_k11: f64) -> Speciation {
    let k21 = 10f64.powf(log_k21);
    let k11 = 10f64.powf(log_k11);

    let a = k11 * k21;
    let b = k11 * (2.0 * k21 * guest_0 - k21 * host_0 + 1.0);
    let c = k11 * (guest_0 - host_0) + 1.0;
    let host = min_cubic_root(a, b, c, -host_0);

    let guest = guest_0 / (1.0 + k11 * host + k11 * k21 * host * host);
    let hg = k11 * host * guest;
    let h2g = k11 * k21 * host * host * guest;

    Speciation {
        host,
        guest,
        complexes: [h2g, hg],
    }
}

/// `H/H0·pure + HG/H0·δ(HG) + 2·H2G/H0·δ(H2G)`.
pub fn signal(s: &Speciation, host_0: f64, pure: f64, complex: [f64; 2]) -> f64 {
    s.host / host_0 * pure
        + s.complexes[1] / host_0 * complex[1]
        + 2.0 * s.complexes[0] / host_0 * complex[0]
}
