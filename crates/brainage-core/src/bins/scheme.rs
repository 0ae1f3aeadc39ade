//! Bin geometry for a discretized age range.

use serde::{Deserialize, Serialize};

use crate::error::{PredictionError, PredictionResult};

/// Relative tolerance for the exact-divisibility test. Ranges expressed in
/// f64 (e.g. `(42.0, 82.0)` with step `1.0`) must validate despite float
/// representation error.
const DIVISIBILITY_TOLERANCE: f64 = 1e-9;

/// Inclusive-exclusive age interval `[start, end)` covered by the bins.
///
/// Immutable once constructed; `start < end` is enforced at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeRange {
    pub start: f64,
    pub end: f64,
}

impl AgeRange {
    /// Create a range, rejecting degenerate or non-finite bounds.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `start >= end` or either bound is not finite.
    pub fn new(start: f64, end: f64) -> PredictionResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(PredictionError::invalid_config(format!(
                "age range bounds must be finite, got ({start}, {end})"
            )));
        }
        if start >= end {
            return Err(PredictionError::invalid_config(format!(
                "age range start must be below end, got ({start}, {end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Width of the range.
    #[inline]
    #[must_use]
    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// Discretization geometry: bin centers for a `(range, step)` pair.
///
/// `centers()[i] = start + step/2 + i * step`, a pure function of the
/// inputs. The geometry is computed once at construction and never mutated.
///
/// # Errors
///
/// Construction fails with `InvalidConfiguration` when `step <= 0` or when
/// the range span is not an exact multiple of `step`. There is no sentinel
/// return: an invalid `(range, step)` pair cannot produce a scheme.
///
/// # Example
///
/// ```
/// use brainage_core::bins::{AgeRange, BinScheme};
///
/// let scheme = BinScheme::new(AgeRange::new(0.0, 100.0).unwrap(), 1.0).unwrap();
/// assert_eq!(scheme.bin_count(), 100);
/// assert_eq!(scheme.centers()[0], 0.5);
/// assert_eq!(scheme.centers()[99], 99.5);
/// ```
#[derive(Debug, Clone)]
pub struct BinScheme {
    range: AgeRange,
    step: f64,
    centers: Vec<f64>,
}

impl BinScheme {
    /// Compute the bin geometry for `range` and `step`.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `step` is not a positive finite number, if
    /// the span is not an exact multiple of `step`, or if fewer than one bin
    /// results.
    pub fn new(range: AgeRange, step: f64) -> PredictionResult<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(PredictionError::invalid_config(format!(
                "bin step must be positive and finite, got {step}"
            )));
        }

        let ratio = range.span() / step;
        let count = ratio.round();
        if (ratio - count).abs() > DIVISIBILITY_TOLERANCE * ratio.max(1.0) {
            return Err(PredictionError::invalid_config(format!(
                "age range ({}, {}) is not divisible by bin step {step}",
                range.start, range.end
            )));
        }
        if count < 1.0 {
            return Err(PredictionError::invalid_config(format!(
                "age range ({}, {}) with step {step} yields no bins",
                range.start, range.end
            )));
        }

        let count = count as usize;
        let centers = (0..count)
            .map(|i| range.start + step / 2.0 + step * i as f64)
            .collect();

        Ok(Self {
            range,
            step,
            centers,
        })
    }

    /// Number of bins, `(end - start) / step`.
    #[inline]
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.centers.len()
    }

    /// Ordered bin centers, strictly increasing with spacing `step`.
    #[inline]
    #[must_use]
    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    /// Bin width.
    #[inline]
    #[must_use]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// The range this scheme covers.
    #[inline]
    #[must_use]
    pub fn range(&self) -> AgeRange {
        self.range
    }
}
