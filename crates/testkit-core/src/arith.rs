//! Arithmetic kernels behind the `testmath` primitives.
//!
//! These are fixture functions: results must be bit-identical on every
//! platform, so the iteration count and starting guess of
//! [`sqrt_approx`] are pinned rather than tuned.

/// Newton iterations performed by [`sqrt_approx`], regardless of convergence.
pub const SQRT_ITERATIONS: u32 = 10;

/// Wrapping 32-bit sum.
#[inline]
#[must_use]
pub const fn add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

/// Wrapping 32-bit product.
#[inline]
#[must_use]
pub const fn multiply(a: i32, b: i32) -> i32 {
    a.wrapping_mul(b)
}

/// Ten Newton steps `g = (g + x/g) / 2` from `g = x/2`.
///
/// Inputs `<= 0.0` yield `0.0`. NaN is not `<= 0.0` and propagates through
/// the iteration.
#[must_use]
pub fn sqrt_approx(x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let mut guess = x / 2.0;
    for _ in 0..SQRT_ITERATIONS {
        guess = (guess + x / guess) / 2.0;
    }
    guess
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_basic_and_wrapping() {
        assert_eq!(add(2, 3), 5);
        assert_eq!(add(-7, 7), 0);
        assert_eq!(add(i32::MAX, 1), i32::MIN);
        assert_eq!(add(i32::MIN, -1), i32::MAX);
    }

    #[test]
    fn multiply_basic_and_wrapping() {
        assert_eq!(multiply(5, 6), 30);
        assert_eq!(multiply(-4, 3), -12);
        assert_eq!(multiply(i32::MAX, 2), -2);
        assert_eq!(multiply(65536, 65536), 0);
    }

    #[test]
    fn sqrt_of_sixteen() {
        assert!((sqrt_approx(16.0) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn sqrt_non_positive_is_exact_zero() {
        assert_eq!(sqrt_approx(0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(sqrt_approx(-1.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(sqrt_approx(-0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(sqrt_approx(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn sqrt_nan_runs_the_iteration() {
        assert!(sqrt_approx(f64::NAN).is_nan());
        assert!(sqrt_approx(-f64::NAN).is_nan());
    }

    #[test]
    fn sqrt_iteration_count_is_pinned() {
        // Ten steps from 1e6/2 have not converged on 1000 yet.
        let x = 1.0e6;
        let mut g = x / 2.0;
        for _ in 0..10 {
            g = (g + x / g) / 2.0;
        }
        assert_eq!(sqrt_approx(x).to_bits(), g.to_bits());
        assert!((sqrt_approx(x) - 1000.0).abs() > 1.0);
    }

    #[test]
    fn sqrt_small_inputs() {
        assert!((sqrt_approx(2.0) - std::f64::consts::SQRT_2).abs() < 1e-12);
        assert!((sqrt_approx(0.25) - 0.5).abs() < 1e-12);
    }
}
