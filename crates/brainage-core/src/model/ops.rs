//! Volumetric tensor primitives.
//!
//! The backend ships 2-D convolution and pooling kernels; the 3-D variants
//! needed for scan volumes are composed here by sweeping the depth axis.
//! Layout throughout: `[batch, channels, depth, height, width]`.

use candle_core::Tensor;
use rand_distr::{Distribution, Normal};

use crate::determinism;
use crate::error::{PredictionError, PredictionResult};

/// 3-D convolution, stride 1, symmetric zero padding on all spatial axes.
///
/// `input` is `[B, C, D, H, W]`, `weight` is `[O, C, KD, KH, KW]`, `bias`
/// is `[O]`. Each output depth plane is the sum over kernel-depth offsets
/// of a 2-D convolution between the corresponding input plane and kernel
/// slice.
pub fn conv3d(
    input: &Tensor,
    weight: &Tensor,
    bias: &Tensor,
    padding: usize,
) -> PredictionResult<Tensor> {
    let (_b, _c, depth, _h, _w) = input.dims5()?;
    let (out_channels, _wc, kernel_depth, _kh, _kw) = weight.dims5()?;

    let padded = if padding > 0 {
        input.pad_with_zeros(2, padding, padding)?
    } else {
        input.clone()
    };
    let out_depth = depth + 2 * padding - kernel_depth + 1;

    let mut planes = Vec::with_capacity(out_depth);
    for od in 0..out_depth {
        let mut plane = depth_slice_conv(&padded, weight, od, 0, padding)?;
        for k in 1..kernel_depth {
            plane = (plane + depth_slice_conv(&padded, weight, od, k, padding)?)?;
        }
        planes.push(plane.unsqueeze(2)?);
    }

    let output = Tensor::cat(&planes, 2)?;
    let bias = bias.reshape((1, out_channels, 1, 1, 1))?;
    Ok(output.broadcast_add(&bias)?)
}

fn depth_slice_conv(
    padded: &Tensor,
    weight: &Tensor,
    out_depth: usize,
    kernel_offset: usize,
    padding: usize,
) -> PredictionResult<Tensor> {
    let plane = padded.narrow(2, out_depth + kernel_offset, 1)?.squeeze(2)?;
    let kernel = weight.narrow(2, kernel_offset, 1)?.squeeze(2)?;
    Ok(plane.conv2d(&kernel, padding, 1, 1, 1)?)
}

/// 2×2×2 max pooling with stride 2. Odd trailing extents are dropped, as
/// in floor-mode pooling.
pub fn max_pool3d_2(input: &Tensor) -> PredictionResult<Tensor> {
    let (_b, _c, depth, _h, _w) = input.dims5()?;
    let out_depth = depth / 2;
    if out_depth == 0 {
        return Err(PredictionError::ShapeMismatch {
            context: "max_pool3d",
            expected: 2,
            actual: depth,
        });
    }

    let mut planes = Vec::with_capacity(out_depth);
    for od in 0..out_depth {
        let even = input.narrow(2, 2 * od, 1)?.squeeze(2)?.max_pool2d(2)?;
        let odd = input.narrow(2, 2 * od + 1, 1)?.squeeze(2)?.max_pool2d(2)?;
        planes.push(even.maximum(&odd)?.unsqueeze(2)?);
    }

    Ok(Tensor::cat(&planes, 2)?)
}

/// Channel-wise batch normalization over a `[B, C, D, H, W]` volume with
/// externally supplied statistics (running statistics in evaluation mode,
/// batch statistics in training mode).
pub fn batch_norm3d(
    input: &Tensor,
    weight: &Tensor,
    bias: &Tensor,
    mean: &Tensor,
    variance: &Tensor,
    eps: f64,
) -> PredictionResult<Tensor> {
    let channels = mean.dims1()?;
    let shape = (1, channels, 1, 1, 1);

    let mean = mean.reshape(shape)?;
    let std = (variance.reshape(shape)? + eps)?.sqrt()?;
    let weight = weight.reshape(shape)?;
    let bias = bias.reshape(shape)?;

    let normalized = input.broadcast_sub(&mean)?.broadcast_div(&std)?;
    Ok(normalized.broadcast_mul(&weight)?.broadcast_add(&bias)?)
}

/// Per-channel mean and (biased) variance over batch and spatial axes.
pub fn batch_statistics(input: &Tensor) -> PredictionResult<(Tensor, Tensor)> {
    // [B, C, D, H, W] -> [C, B*D*H*W]
    let per_channel = input.transpose(0, 1)?.flatten_from(1)?;
    let mean = per_channel.mean(1)?;
    let variance = (per_channel.sqr()?.mean(1)? - mean.sqr()?)?;
    Ok((mean, variance))
}

/// Mean over all three spatial axes, keeping them as size-1 dims:
/// `[B, C, D, H, W]` -> `[B, C, 1, 1, 1]`.
pub fn global_avg_pool3d(input: &Tensor) -> PredictionResult<Tensor> {
    Ok(input
        .mean_keepdim(4)?
        .mean_keepdim(3)?
        .mean_keepdim(2)?)
}

/// Sample a Kaiming-normal weight tensor (`std = sqrt(2 / fan_in)`) from
/// the process-wide seeded generator.
pub fn kaiming_normal(
    shape: &[usize],
    fan_in: usize,
    device: &candle_core::Device,
) -> PredictionResult<Tensor> {
    let std = (2.0 / fan_in as f64).sqrt();
    let normal = Normal::new(0.0, std)
        .map_err(|e| PredictionError::invalid_config(format!("degenerate init spread: {e}")))?;

    let count: usize = shape.iter().product();
    let data: Vec<f32> =
        determinism::with_rng(|rng| (0..count).map(|_| normal.sample(rng) as f32).collect());

    Ok(Tensor::from_vec(data, shape, device)?)
}
