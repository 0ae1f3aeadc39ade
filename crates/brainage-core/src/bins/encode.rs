//! Continuous age -> hard index or soft probability vector.

use crate::error::{PredictionError, PredictionResult};

use super::math::normal_cdf;
use super::scheme::{AgeRange, BinScheme};

/// A discretized representation of one or more ages.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    /// One floored bin index per input value.
    Hard(Vec<i64>),
    /// One probability row per input value, `bin_count` entries each.
    Soft(Vec<Vec<f64>>),
}

/// Encoding result: the label together with the bin centers it refers to.
///
/// Both are derived from the same `(range, step)` pair and the caller needs
/// the centers later for decoding, so they travel together.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub label: Label,
    pub centers: Vec<f64>,
}

/// Encode ages over a discretized range, selecting the label mode by `spread`.
///
/// - `spread == 0`: hard labels, `floor((x - start) / step)` per value.
/// - `spread > 0`: soft labels; entry `i` is the probability mass a normal
///   distribution centered at the value (standard deviation `spread`)
///   assigns to bin `i`, i.e. the CDF difference across the bin boundaries.
/// - `spread < 0`: `InvalidConfiguration`.
///
/// Mass falling outside `[start, end)` is clipped and the row is NOT
/// renormalized; row sums therefore degrade for values near the range
/// boundaries. Downstream consumers rely on this exact behavior.
///
/// # Errors
///
/// `InvalidConfiguration` for a negative or non-finite `spread`, or when the
/// `(range, step)` pair itself is invalid.
///
/// # Example
///
/// ```
/// use brainage_core::bins::{encode_one, AgeRange, Label};
///
/// let range = AgeRange::new(0.0, 100.0).unwrap();
/// let hard = encode_one(50.0, range, 1.0, 0.0).unwrap();
/// assert_eq!(hard.label, Label::Hard(vec![50]));
/// ```
pub fn encode(
    values: &[f64],
    range: AgeRange,
    step: f64,
    spread: f64,
) -> PredictionResult<Encoded> {
    if !spread.is_finite() || spread < 0.0 {
        return Err(PredictionError::invalid_config(format!(
            "label spread must be zero or positive, got {spread}"
        )));
    }

    let scheme = BinScheme::new(range, step)?;
    let centers = scheme.centers().to_vec();

    let label = if spread == 0.0 {
        Label::Hard(
            values
                .iter()
                .map(|x| ((x - range.start) / step).floor() as i64)
                .collect(),
        )
    } else {
        let half = step / 2.0;
        Label::Soft(
            values
                .iter()
                .map(|&x| {
                    centers
                        .iter()
                        .map(|&c| normal_cdf(c + half, x, spread) - normal_cdf(c - half, x, spread))
                        .collect()
                })
                .collect(),
        )
    };

    Ok(Encoded { label, centers })
}

/// Encode a single age. See [`encode`].
pub fn encode_one(value: f64, range: AgeRange, step: f64, spread: f64) -> PredictionResult<Encoded> {
    encode(&[value], range, step, spread)
}
