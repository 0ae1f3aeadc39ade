//! Scalar math helpers for soft-label computation.

use std::f64::consts::SQRT_2;

/// Error function, Abramowitz & Stegun 7.1.26 polynomial approximation.
/// Maximum absolute error 1.5e-7, far below the tolerances used anywhere
/// in the pipeline.
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// CDF of a normal distribution with the given mean and standard deviation.
pub fn normal_cdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    0.5 * (1.0 + erf((x - mean) / (std_dev * SQRT_2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_erf_known_values() {
        assert_abs_diff_eq!(erf(0.0), 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(erf(1.0), 0.842_700_79, epsilon = 1e-6);
        assert_abs_diff_eq!(erf(-1.0), -0.842_700_79, epsilon = 1e-6);
        assert_abs_diff_eq!(erf(2.0), 0.995_322_27, epsilon = 1e-6);
    }

    #[test]
    fn test_normal_cdf_symmetry() {
        assert_abs_diff_eq!(normal_cdf(50.0, 50.0, 2.0), 0.5, epsilon = 1e-7);
        let lo = normal_cdf(48.0, 50.0, 2.0);
        let hi = normal_cdf(52.0, 50.0, 2.0);
        assert_abs_diff_eq!(lo + hi, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_normal_cdf_one_sigma() {
        // P(X <= mean + sigma) for a normal distribution.
        assert_abs_diff_eq!(normal_cdf(1.0, 0.0, 1.0), 0.841_344_75, epsilon = 1e-6);
    }
}
