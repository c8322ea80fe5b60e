//! Root finders for the mass-action polynomials.
//!
//! - `quadratic_roots` / `min_quadratic_root`: closed-form quadratic formula
//! - `min_cubic_root`: three seeded Newton-Raphson searches plus a fixed
//!   priority rule for picking one result
//!
//! Numerical notes:
//! - `quadratic_roots` reports "no real roots" as `(0, 0)`. Callers must treat
//!   that as a failure, not as a zero root.
//! - `min_quadratic_root` does not look at the discriminant. Use
//!   `try_min_quadratic_root` when the inputs are not known to be physical.
//! - The third cubic search converges on `f'(x) = 0`, i.e. it lands on a
//!   stationary point. It is only returned when both real searches end up
//!   negative.

use thiserror::Error;

/// Convergence threshold on `|f(x)|` for the Newton searches.
const NEWTON_EPSILON: f64 = 1e-8;

/// Iteration cap for each Newton search.
const NEWTON_MAX_ITER: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RootError {
    #[error("no real roots (discriminant {discriminant})")]
    NoRealRoots { discriminant: f64 },
}

fn discriminant(a: f64, b: f64, c: f64) -> f64 {
    b * b - 4.0 * a * c
}

/// Both real roots of `a·x² + b·x + c = 0`, smaller-formula root first.
///
/// Returns `(0, 0)` when the discriminant is negative.
pub fn quadratic_roots(a: f64, b: f64, c: f64) -> (f64, f64) {
    let disc = discriminant(a, b, c);
    if disc < 0.0 {
        return (0.0, 0.0);
    }
    let sq = disc.sqrt();
    ((-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a))
}

/// `(-b - √(b² - 4ac)) / 2a` without any discriminant check.
///
/// A negative discriminant yields NaN.
pub fn min_quadratic_root(a: f64, b: f64, c: f64) -> f64 {
    (-b - discriminant(a, b, c).sqrt()) / (2.0 * a)
}

/// Checked variant of [`min_quadratic_root`].
pub fn try_min_quadratic_root(a: f64, b: f64, c: f64) -> Result<f64, RootError> {
    let disc = discriminant(a, b, c);
    if disc < 0.0 || !disc.is_finite() {
        return Err(RootError::NoRealRoots { discriminant: disc });
    }
    Ok((-b - disc.sqrt()) / (2.0 * a))
}

/// Cubic `a·x³ + b·x² + c·x + d` and its first two derivatives.
#[derive(Debug, Clone, Copy)]
struct Cubic {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl Cubic {
    fn f(&self, x: f64) -> f64 {
        ((self.a * x + self.b) * x + self.c) * x + self.d
    }

    fn df(&self, x: f64) -> f64 {
        (3.0 * self.a * x + 2.0 * self.b) * x + self.c
    }

    fn d2f(&self, x: f64) -> f64 {
        6.0 * self.a * x + 2.0 * self.b
    }
}

/// Newton-Raphson on `g` with derivative `dg`.
///
/// Stops when `|g(x)| < NEWTON_EPSILON` or after `NEWTON_MAX_ITER` updates,
/// returning the last iterate either way.
fn newton(mut x: f64, g: impl Fn(f64) -> f64, dg: impl Fn(f64) -> f64) -> f64 {
    let mut y = g(x);
    let mut iter = 0;
    while y.abs() >= NEWTON_EPSILON && iter < NEWTON_MAX_ITER {
        x -= y / dg(x);
        y = g(x);
        iter += 1;
    }
    x
}

/// Pick one of the three cubic search results.
///
/// Strict priority: `root1` if non-negative, else `root2` if non-negative,
/// else `root3` whatever its sign.
pub fn select_root(root1: f64, root2: f64, root3: f64) -> f64 {
    if root1 >= 0.0 {
        root1
    } else if root2 >= 0.0 {
        root2
    } else {
        root3
    }
}

/// One real root of `a·x³ + b·x² + c·x + d = 0`, preferring non-negative ones.
///
/// Seeds come from the stationary points `s1 <= s2` of the cubic (via
/// [`quadratic_roots`] on `3a, 2b, c`):
/// - `s1 + 1` and the midpoint of `s1, s2` converge on `f(x) = 0`
/// - `s2 - 1` runs Newton on `f'` with `f''`, converging on `f'(x) = 0`
///
/// The results are combined with [`select_root`].
pub fn min_cubic_root(a: f64, b: f64, c: f64, d: f64) -> f64 {
    let cubic = Cubic { a, b, c, d };
    let (s1, s2) = quadratic_roots(3.0 * a, 2.0 * b, c);

    let root1 = newton(s1 + 1.0, |x| cubic.f(x), |x| cubic.df(x));
    let root2 = newton((s1 + s2) / 2.0, |x| cubic.f(x), |x| cubic.df(x));
    let root3 = newton(s2 - 1.0, |x| cubic.df(x), |x| cubic.d2f(x));

    select_root(root1, root2, root3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn quadratic_roots_satisfy_equation() {
        for &(a, b, c) in &[(1.0, 5.0, 6.0), (2.0, 7.0, 0.0), (0.5, 3.0, 1.0), (1.0, 2.0, 1.0)] {
            let (r1, r2) = quadratic_roots(a, b, c);
            for r in [r1, r2] {
                assert_abs_diff_eq!(a * r * r + b * r + c, 0.0, epsilon = 1e-9);
            }
            assert!(r1 <= r2);
        }
    }

    #[test]
    fn quadratic_roots_without_real_solution_are_zero() {
        assert_eq!(quadratic_roots(1.0, 0.0, 1.0), (0.0, 0.0));
    }

    #[test]
    fn min_quadratic_root_is_unchecked() {
        assert!(min_quadratic_root(1.0, 0.0, 1.0).is_nan());
        assert_abs_diff_eq!(min_quadratic_root(1.0, -3.0, 2.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn checked_quadratic_root_reports_failure() {
        let err = try_min_quadratic_root(1.0, 0.0, 1.0).unwrap_err();
        assert_eq!(err, RootError::NoRealRoots { discriminant: -4.0 });
        assert_abs_diff_eq!(try_min_quadratic_root(1.0, -3.0, 2.0).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn select_root_priority() {
        assert_eq!(select_root(5.0, -2.0, -7.0), 5.0);
        assert_eq!(select_root(-5.0, 3.0, -7.0), 3.0);
        assert_eq!(select_root(-5.0, -3.0, -7.0), -7.0);
        assert_eq!(select_root(0.0, 3.0, 1.0), 0.0);
    }

    #[test]
    fn cubic_with_single_positive_root() {
        // (x - 0.5)(x^2 + x + 1) = x^3 + 0.5x^2 + 0.5x - 0.5
        let x = min_cubic_root(1.0, 0.5, 0.5, -0.5);
        assert_abs_diff_eq!(x, 0.5, epsilon = 1e-7);
    }

    #[test]
    fn cubic_falls_back_to_stationary_point() {
        // Roots {5, -2, -7}: both real searches settle on -2, so the third
        // search (a stationary point of the cubic) is returned unmodified.
        let (a, b, c, d) = (1.0, 4.0, -31.0, -70.0);
        let x = min_cubic_root(a, b, c, d);
        let (_, s2) = quadratic_roots(3.0 * a, 2.0 * b, c);
        assert_abs_diff_eq!(x, s2, epsilon = 1e-6);
        assert!(x > 0.0);
    }

    #[test]
    fn mass_action_cubic_root_is_physical() {
        // 2:1/1:1 host cubic, K21 = 1e2, K11 = 1e4, H0 = 1 mM, G0 = 2.5 mM.
        let (k21, k11, h0, g0) = (1e2, 1e4, 1e-3, 2.5e-3);
        let a = k11 * k21;
        let b = k11 * (2.0 * k21 * g0 - k21 * h0 + 1.0);
        let c = k11 * (g0 - h0) + 1.0;
        let host = min_cubic_root(a, b, c, -h0);
        assert!(host > 0.0 && host < h0);
        assert_abs_diff_eq!(((a * host + b) * host + c) * host - h0, 0.0, epsilon = 1e-8);
    }
}
