//! The prediction pipeline: volume in, scalar age estimate out.

use candle_core::{DType, Device, Tensor};
use tracing::debug;

use crate::bins::{decode, AgeRange, BinScheme};
use crate::error::{PredictionError, PredictionResult};
use crate::model::ModelAdapter;

use super::guard::InferenceGuard;

/// Runs single volumes through the adapter's network and decodes the
/// output distribution into an age estimate.
///
/// Borrows the network read-only; callers serialize prediction against
/// adapter mutations.
#[derive(Debug)]
pub struct InferenceEngine<'a> {
    adapter: &'a ModelAdapter,
    scheme: BinScheme,
}

impl<'a> InferenceEngine<'a> {
    /// Build an engine decoding over unit bins across `age_range`.
    ///
    /// # Errors
    /// `InvalidConfiguration` when the range does not tile into unit bins.
    pub fn new(adapter: &'a ModelAdapter, age_range: AgeRange) -> PredictionResult<Self> {
        let scheme = BinScheme::new(age_range, 1.0)?;
        Ok(Self { adapter, scheme })
    }

    /// The decoding geometry.
    #[inline]
    #[must_use]
    pub fn bin_scheme(&self) -> &BinScheme {
        &self.scheme
    }

    /// Predict the age for one preprocessed scan volume.
    ///
    /// Accepts `[D, H, W]`, `[C, D, H, W]` or an already batched
    /// `[1, C, D, H, W]`; the first two gain leading dimensions of size 1.
    /// The forward pass runs in evaluation mode with gradient tracking
    /// suspended; both are restored before this function returns, on error
    /// paths included.
    ///
    /// # Errors
    ///
    /// - `UnsupportedRank` for volumes outside 3/4/5-D.
    /// - `ShapeMismatch` when the network's output width disagrees with
    ///   the bin count of the engine's range.
    /// - Backend errors from the forward pass.
    pub fn predict(&self, volume: &Tensor) -> PredictionResult<f64> {
        let input = batchify(volume)?
            .to_dtype(DType::F32)?
            .to_device(self.adapter.device().device())?;

        let network = self.adapter.network();
        let _guard = InferenceGuard::enter(network);
        let output = network.forward(&input)?;

        let width = output.dims()[1];
        if width != self.scheme.bin_count() {
            return Err(PredictionError::ShapeMismatch {
                context: "network output",
                expected: self.scheme.bin_count(),
                actual: width,
            });
        }

        let row = output.narrow(0, 0, 1)?.squeeze(0)?.to_device(&Device::Cpu)?;
        let log_probs: Vec<f32> = row.to_vec1()?;
        let probabilities: Vec<f64> = log_probs.iter().map(|&v| f64::from(v).exp()).collect();

        let estimate = decode(&probabilities, self.scheme.centers())?;
        debug!(estimate, "decoded age estimate");
        Ok(estimate)
    }
}

fn batchify(volume: &Tensor) -> PredictionResult<Tensor> {
    match volume.rank() {
        3 => Ok(volume.unsqueeze(0)?.unsqueeze(0)?),
        4 => Ok(volume.unsqueeze(0)?),
        5 => Ok(volume.clone()),
        rank => Err(PredictionError::UnsupportedRank { rank }),
    }
}
