//! Adaptation of a (pretrained) network to a new target range.
//!
//! The adapter exclusively owns the network state. Its operations mutate
//! that state in place and are not safe to interleave with concurrent
//! prediction; callers serialize adaptation and inference.

use std::collections::HashMap;
use std::path::Path;

use candle_core::Tensor;
use tracing::{debug, info};

use crate::config::{ArchitectureKind, OptimizerKind};
use crate::device::ComputeDevice;
use crate::error::{PredictionError, PredictionResult};

use super::optim::Optimizer;
use super::sfcn::{Sfcn, DEFAULT_OUTPUT_BINS};
use super::state::NetworkState;

/// Owns the network and repurposes it: freezing, output-layer resizing,
/// optimizer selection and weight snapshot I/O.
#[derive(Debug)]
pub struct ModelAdapter {
    state: NetworkState,
    device: ComputeDevice,
}

impl ModelAdapter {
    /// Build a freshly initialized network of the selected architecture on
    /// the given device.
    pub fn new(architecture: ArchitectureKind, device: &ComputeDevice) -> PredictionResult<Self> {
        let network = match architecture {
            ArchitectureKind::Sfcn => Sfcn::new(device.device(), DEFAULT_OUTPUT_BINS)?,
        };
        info!(
            ?architecture,
            device = device.spec(),
            output_bins = network.output_bins(),
            "initialized network"
        );
        Ok(Self {
            state: NetworkState::new(network),
            device: device.clone(),
        })
    }

    /// The owned network state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    /// Read-only view of the network, for inference.
    #[inline]
    #[must_use]
    pub fn network(&self) -> &Sfcn {
        self.state.network()
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &ComputeDevice {
        &self.device
    }

    /// Mark every parameter non-trainable, then re-enable the output layer.
    ///
    /// Bumps the network generation: optimizers built earlier become stale
    /// and must be reconstructed.
    pub fn freeze_inner_layers(&mut self) {
        self.state.set_all_trainable(false);
        for name in self.state.network().output_parameter_names() {
            self.state.set_trainable(&name, true);
        }
        self.state.bump_generation();
        info!(
            generation = self.state.generation(),
            "froze inner layers; output layer stays trainable"
        );
    }

    /// Replace the output layer with a Kaiming-initialized head of width
    /// `bin_count`, re-enabling its parameters for training.
    ///
    /// Bumps the network generation: optimizers built earlier become stale
    /// and must be reconstructed.
    ///
    /// # Errors
    /// `InvalidConfiguration` for a zero bin count.
    pub fn adapt_output_layer(&mut self, bin_count: usize) -> PredictionResult<()> {
        let device = self.device.device().clone();
        self.state.network_mut().adapt_output(bin_count, &device)?;
        for name in self.state.network().output_parameter_names() {
            self.state.set_trainable(&name, true);
        }
        self.state.bump_generation();
        info!(
            bins = bin_count,
            generation = self.state.generation(),
            "adapted output layer"
        );
        Ok(())
    }

    /// Build an optimizer over the currently trainable parameters,
    /// capturing the current network generation.
    ///
    /// # Errors
    /// `InvalidConfiguration` for a non-positive learning rate.
    pub fn select_optimizer(
        &self,
        kind: OptimizerKind,
        learning_rate: f64,
    ) -> PredictionResult<Optimizer> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(PredictionError::invalid_config(format!(
                "learning rate must be positive and finite, got {learning_rate}"
            )));
        }
        let params = self.state.trainable_parameters();
        debug!(
            ?kind,
            learning_rate,
            parameters = params.len(),
            "selected optimizer"
        );
        Optimizer::new(kind, learning_rate, params, self.state.generation())
    }

    /// Load a pretrained parameter snapshot.
    ///
    /// The snapshot must correspond to the current network state exactly:
    /// every parameter and buffer present by its canonical name with a
    /// matching shape, and nothing else. Any deviation aborts the load with
    /// nothing applied.
    ///
    /// # Errors
    /// `ResourceLoad` for unreadable files and name or shape mismatches.
    pub fn load_pretrained(&mut self, path: &Path) -> PredictionResult<()> {
        let tensors = candle_core::safetensors::load(path, self.device.device())
            .map_err(|e| load_error(path, format!("cannot read snapshot: {e}")))?;

        self.check_correspondence(path, &tensors)?;

        self.state
            .network_mut()
            .load_state(&tensors)
            .map_err(|e| load_error(path, e.to_string()))?;

        info!(
            path = %path.display(),
            tensors = tensors.len(),
            "loaded pretrained weights"
        );
        Ok(())
    }

    /// Write the current parameters and buffers as a snapshot loadable by
    /// [`load_pretrained`](Self::load_pretrained).
    ///
    /// # Errors
    /// `ResourceLoad` when the file cannot be written.
    pub fn save_weights(&self, path: &Path) -> PredictionResult<()> {
        let network = self.state.network();
        let mut tensors: HashMap<String, Tensor> = HashMap::new();
        for (name, var) in network.named_parameters() {
            tensors.insert(name, var.as_tensor().clone());
        }
        for (name, buffer) in network.named_buffers() {
            tensors.insert(name, buffer);
        }

        candle_core::safetensors::save(&tensors, path)
            .map_err(|e| load_error(path, format!("cannot write snapshot: {e}")))?;
        debug!(path = %path.display(), tensors = tensors.len(), "saved weights");
        Ok(())
    }

    fn check_correspondence(
        &self,
        path: &Path,
        tensors: &HashMap<String, Tensor>,
    ) -> PredictionResult<()> {
        let network = self.state.network();
        let mut expected: Vec<(String, Vec<usize>)> = network
            .named_parameters()
            .into_iter()
            .map(|(name, var)| (name, var.as_tensor().dims().to_vec()))
            .collect();
        expected.extend(
            network
                .named_buffers()
                .into_iter()
                .map(|(name, buffer)| (name, buffer.dims().to_vec())),
        );

        for (name, dims) in &expected {
            let Some(tensor) = tensors.get(name) else {
                return Err(load_error(path, format!("tensor '{name}' missing")));
            };
            if tensor.dims() != dims.as_slice() {
                return Err(load_error(
                    path,
                    format!(
                        "tensor '{name}' has shape {:?}, expected {:?}",
                        tensor.dims(),
                        dims
                    ),
                ));
            }
        }

        for name in tensors.keys() {
            if !expected.iter().any(|(expected_name, _)| expected_name == name) {
                return Err(load_error(path, format!("unexpected tensor '{name}'")));
            }
        }

        Ok(())
    }
}

fn load_error(path: &Path, message: String) -> PredictionError {
    PredictionError::ResourceLoad {
        path: path.display().to_string(),
        message,
    }
}
