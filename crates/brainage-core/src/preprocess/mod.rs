//! Spatial preprocessing of scan volumes.

use candle_core::Tensor;

use crate::error::{PredictionError, PredictionResult};

/// Center-crop the spatial extent of a volume.
///
/// The last three dimensions are treated as spatial; leading batch and
/// channel dimensions of 4-D and 5-D inputs pass through untouched.
///
/// # Errors
///
/// - `UnsupportedRank` for anything other than 3-D, 4-D or 5-D input.
/// - `ShapeMismatch` when a requested output extent exceeds the input.
pub fn crop_center(volume: &Tensor, out_shape: (usize, usize, usize)) -> PredictionResult<Tensor> {
    let rank = volume.rank();
    if !(3..=5).contains(&rank) {
        return Err(PredictionError::UnsupportedRank { rank });
    }

    let dims = volume.dims();
    let targets = [out_shape.0, out_shape.1, out_shape.2];

    let mut cropped = volume.clone();
    for (offset, &target) in targets.iter().enumerate() {
        let axis = rank - 3 + offset;
        let extent = dims[axis];
        if target > extent {
            return Err(PredictionError::ShapeMismatch {
                context: "crop_center",
                expected: target,
                actual: extent,
            });
        }
        let start = (extent - target) / 2;
        cropped = cropped.narrow(axis, start, target)?;
    }

    Ok(cropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn volume(dims: &[usize]) -> Tensor {
        let count: usize = dims.iter().product();
        let data: Vec<f32> = (0..count).map(|i| i as f32).collect();
        Tensor::from_vec(data, dims, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_crop_3d_center() {
        let cropped = crop_center(&volume(&[6, 6, 6]), (2, 2, 2)).unwrap();
        assert_eq!(cropped.dims(), &[2, 2, 2]);
        // Center voxels of a 6^3 index cube start at offset (2, 2, 2).
        let first: f32 = cropped
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap()[0];
        assert_eq!(first, (2 * 36 + 2 * 6 + 2) as f32);
    }

    #[test]
    fn test_crop_preserves_leading_dims() {
        let cropped = crop_center(&volume(&[2, 3, 8, 8, 8]), (4, 4, 4)).unwrap();
        assert_eq!(cropped.dims(), &[2, 3, 4, 4, 4]);
    }

    #[test]
    fn test_crop_rejects_unsupported_rank() {
        let err = crop_center(&volume(&[8, 8]), (4, 4, 4)).unwrap_err();
        assert!(matches!(err, PredictionError::UnsupportedRank { rank: 2 }));
    }

    #[test]
    fn test_crop_rejects_growth() {
        let err = crop_center(&volume(&[4, 4, 4]), (8, 4, 4)).unwrap_err();
        assert!(matches!(err, PredictionError::ShapeMismatch { .. }));
    }
}
