//! Probability vector -> continuous age estimate.

use crate::error::{PredictionError, PredictionResult};

/// Expectation of the bin centers under the given probability vector.
///
/// No normalization is applied: callers supply a probability-like vector
/// (e.g. exponentiated log-probabilities from the classifier head) that
/// already sums to approximately 1.
///
/// # Errors
/// `ShapeMismatch` when the vector lengths differ.
pub fn decode(probabilities: &[f64], centers: &[f64]) -> PredictionResult<f64> {
    if probabilities.len() != centers.len() {
        return Err(PredictionError::ShapeMismatch {
            context: "decode",
            expected: centers.len(),
            actual: probabilities.len(),
        });
    }

    Ok(probabilities
        .iter()
        .zip(centers)
        .map(|(p, c)| p * c)
        .sum())
}
