//! SFCN: fully convolutional network for volumetric age estimation.
//!
//! Six convolution blocks extract features from a single-channel scan
//! volume; a global average pool and a 1×1×1 output convolution
//! (`conv_6`) map the features to log-probabilities over age bins.
//!
//! # Architecture
//!
//! | Stage | Layers | Channels |
//! |-------|--------|----------|
//! | blocks 0–4 | conv 3×3×3 (pad 1), batch-norm, max-pool 2×2×2, ReLU | 32, 64, 128, 256, 256 |
//! | block 5 | conv 1×1×1, batch-norm, ReLU | 64 |
//! | classifier | global avg pool, conv_6 1×1×1, log-softmax | `output_bins` |
//!
//! Input volumes must survive five halvings, so every spatial extent has to
//! be at least 32.
//!
//! # Modes
//!
//! `training` selects batch statistics over running statistics in the
//! normalization layers; `grad_enabled` controls whether the forward pass
//! records an autograd graph (weights are read detached when disabled).
//! Both are plain per-network flags; the pipeline is single-threaded by
//! contract.

use std::cell::Cell;
use std::collections::HashMap;

use candle_core::{DType, Device, Tensor, Var};

use crate::error::{PredictionError, PredictionResult};

use super::ops::{
    batch_norm3d, batch_statistics, conv3d, global_avg_pool3d, kaiming_normal, max_pool3d_2,
};

/// Output width of published pretrained snapshots; the head is adapted to
/// the configured range after loading.
pub const DEFAULT_OUTPUT_BINS: usize = 40;

/// Name prefix of the output layer; its parameters stay trainable when the
/// rest of the network is frozen.
pub const OUTPUT_LAYER: &str = "classifier.conv_6";

const BLOCK_CHANNELS: [usize; 6] = [32, 64, 128, 256, 256, 64];
const FEATURE_CHANNELS: usize = 64;
const BN_EPS: f64 = 1e-5;

fn conv_name(index: usize) -> String {
    format!("feature_extractor.conv_{index}")
}

fn bn_name(index: usize) -> String {
    format!("feature_extractor.bn_{index}")
}

struct SfcnBlock {
    conv_weight: Var,
    conv_bias: Var,
    bn_weight: Var,
    bn_bias: Var,
    running_mean: Tensor,
    running_var: Tensor,
    padding: usize,
    pool: bool,
}

/// The SFCN network state: learnable parameters, normalization buffers and
/// mode flags.
pub struct Sfcn {
    blocks: Vec<SfcnBlock>,
    output_weight: Var,
    output_bias: Var,
    training: Cell<bool>,
    grad_enabled: Cell<bool>,
}

impl Sfcn {
    /// Build a freshly initialized network on `device` with an
    /// `output_bins`-wide head.
    ///
    /// Convolution weights are Kaiming-normal samples from the process-wide
    /// seeded generator; normalization layers start at identity.
    pub fn new(device: &Device, output_bins: usize) -> PredictionResult<Self> {
        let mut blocks = Vec::with_capacity(BLOCK_CHANNELS.len());
        let mut in_channels = 1;

        for (index, &out_channels) in BLOCK_CHANNELS.iter().enumerate() {
            let last = index == BLOCK_CHANNELS.len() - 1;
            let kernel = if last { 1 } else { 3 };
            let fan_in = in_channels * kernel * kernel * kernel;

            let conv_weight = kaiming_normal(
                &[out_channels, in_channels, kernel, kernel, kernel],
                fan_in,
                device,
            )?;

            blocks.push(SfcnBlock {
                conv_weight: Var::from_tensor(&conv_weight)?,
                conv_bias: Var::from_tensor(&Tensor::zeros(out_channels, DType::F32, device)?)?,
                bn_weight: Var::from_tensor(&Tensor::ones(out_channels, DType::F32, device)?)?,
                bn_bias: Var::from_tensor(&Tensor::zeros(out_channels, DType::F32, device)?)?,
                running_mean: Tensor::zeros(out_channels, DType::F32, device)?,
                running_var: Tensor::ones(out_channels, DType::F32, device)?,
                padding: if last { 0 } else { 1 },
                pool: !last,
            });
            in_channels = out_channels;
        }

        let (output_weight, output_bias) = Self::output_layer(output_bins, device)?;

        Ok(Self {
            blocks,
            output_weight: Var::from_tensor(&output_weight)?,
            output_bias: Var::from_tensor(&output_bias)?,
            training: Cell::new(true),
            grad_enabled: Cell::new(true),
        })
    }

    fn output_layer(bins: usize, device: &Device) -> PredictionResult<(Tensor, Tensor)> {
        if bins == 0 {
            return Err(PredictionError::invalid_config(
                "output layer needs at least one bin",
            ));
        }
        let weight = kaiming_normal(
            &[bins, FEATURE_CHANNELS, 1, 1, 1],
            FEATURE_CHANNELS,
            device,
        )?;
        let bias = Tensor::zeros(bins, DType::F32, device)?;
        Ok((weight, bias))
    }

    /// Forward pass: `[B, 1, D, H, W]` -> log-probabilities `[B, bins]`.
    pub fn forward(&self, input: &Tensor) -> PredictionResult<Tensor> {
        let detach = !self.grad_enabled.get();
        let read = |var: &Var| -> Tensor {
            if detach {
                var.as_tensor().detach()
            } else {
                var.as_tensor().clone()
            }
        };

        let mut x = input.clone();
        for block in &self.blocks {
            x = conv3d(&x, &read(&block.conv_weight), &read(&block.conv_bias), block.padding)?;

            let (mean, variance) = if self.training.get() {
                batch_statistics(&x)?
            } else {
                (block.running_mean.clone(), block.running_var.clone())
            };
            x = batch_norm3d(
                &x,
                &read(&block.bn_weight),
                &read(&block.bn_bias),
                &mean,
                &variance,
                BN_EPS,
            )?;

            if block.pool {
                x = max_pool3d_2(&x)?;
            }
            x = x.relu()?;
        }

        let pooled = global_avg_pool3d(&x)?;
        let logits = conv3d(&pooled, &read(&self.output_weight), &read(&self.output_bias), 0)?;

        let (batch, bins, _, _, _) = logits.dims5()?;
        let logits = logits.reshape((batch, bins))?;
        Ok(candle_nn::ops::log_softmax(&logits, 1)?)
    }

    /// Replace the output layer with a freshly Kaiming-initialized head of
    /// width `bins`.
    pub(crate) fn adapt_output(&mut self, bins: usize, device: &Device) -> PredictionResult<()> {
        let (weight, bias) = Self::output_layer(bins, device)?;
        self.output_weight = Var::from_tensor(&weight)?;
        self.output_bias = Var::from_tensor(&bias)?;
        Ok(())
    }

    /// Current output width.
    #[must_use]
    pub fn output_bins(&self) -> usize {
        self.output_weight.as_tensor().dims()[0]
    }

    /// Learnable parameters, by canonical name. The returned handles share
    /// storage with the network.
    #[must_use]
    pub fn named_parameters(&self) -> Vec<(String, Var)> {
        let mut params = Vec::with_capacity(self.blocks.len() * 4 + 2);
        for (index, block) in self.blocks.iter().enumerate() {
            let conv = conv_name(index);
            let bn = bn_name(index);
            params.push((format!("{conv}.weight"), block.conv_weight.clone()));
            params.push((format!("{conv}.bias"), block.conv_bias.clone()));
            params.push((format!("{bn}.weight"), block.bn_weight.clone()));
            params.push((format!("{bn}.bias"), block.bn_bias.clone()));
        }
        params.push((format!("{OUTPUT_LAYER}.weight"), self.output_weight.clone()));
        params.push((format!("{OUTPUT_LAYER}.bias"), self.output_bias.clone()));
        params
    }

    /// Non-learnable buffers (normalization running statistics), by name.
    #[must_use]
    pub fn named_buffers(&self) -> Vec<(String, Tensor)> {
        let mut buffers = Vec::with_capacity(self.blocks.len() * 2);
        for (index, block) in self.blocks.iter().enumerate() {
            let bn = bn_name(index);
            buffers.push((format!("{bn}.running_mean"), block.running_mean.clone()));
            buffers.push((format!("{bn}.running_var"), block.running_var.clone()));
        }
        buffers
    }

    /// Names of the output-layer parameters.
    #[must_use]
    pub fn output_parameter_names(&self) -> Vec<String> {
        vec![
            format!("{OUTPUT_LAYER}.weight"),
            format!("{OUTPUT_LAYER}.bias"),
        ]
    }

    /// Overwrite every parameter and buffer from a name-keyed snapshot.
    /// Callers have already validated exact name/shape correspondence.
    pub(crate) fn load_state(&mut self, tensors: &HashMap<String, Tensor>) -> PredictionResult<()> {
        for (name, var) in self.named_parameters() {
            let tensor = tensors.get(&name).ok_or_else(|| missing(&name))?;
            var.set(&tensor.to_dtype(DType::F32)?)?;
        }
        for (index, block) in self.blocks.iter_mut().enumerate() {
            let bn = bn_name(index);
            let mean_name = format!("{bn}.running_mean");
            let var_name = format!("{bn}.running_var");
            block.running_mean = tensors
                .get(&mean_name)
                .ok_or_else(|| missing(&mean_name))?
                .to_dtype(DType::F32)?;
            block.running_var = tensors
                .get(&var_name)
                .ok_or_else(|| missing(&var_name))?
                .to_dtype(DType::F32)?;
        }
        Ok(())
    }

    /// Select batch statistics (training) or running statistics
    /// (evaluation) in the normalization layers.
    pub fn set_training(&self, training: bool) {
        self.training.set(training);
    }

    #[must_use]
    pub fn is_training(&self) -> bool {
        self.training.get()
    }

    /// Control whether forward passes record an autograd graph.
    pub fn set_grad_enabled(&self, enabled: bool) {
        self.grad_enabled.set(enabled);
    }

    #[must_use]
    pub fn grad_enabled(&self) -> bool {
        self.grad_enabled.get()
    }
}

impl std::fmt::Debug for Sfcn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sfcn")
            .field("blocks", &self.blocks.len())
            .field("output_bins", &self.output_bins())
            .field("training", &self.training.get())
            .field("grad_enabled", &self.grad_enabled.get())
            .finish()
    }
}

fn missing(name: &str) -> PredictionError {
    PredictionError::ResourceLoad {
        path: "snapshot".to_string(),
        message: format!("tensor '{name}' absent from snapshot"),
    }
}
