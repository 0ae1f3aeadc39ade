//! Predictor configuration.
//!
//! `PredictorConfig` aggregates everything a caller supplies to construct a
//! predictor. Load from a TOML file or use `Default::default()` for
//! development.
//!
//! # TOML Structure
//!
//! ```toml
//! learning_rate = 0.0001
//! epochs = 240
//! batch_size = 3
//! train_all_layers = false
//! architecture = "sfcn"
//! optimizer = "adam"
//! device = "cpu"
//! pretrained_weights = "models/sfcn_epoch_best_mae.safetensors"
//!
//! [age_range]
//! start = 42.0
//! end = 82.0
//! ```
//!
//! # Design Principles
//!
//! - **NO FALLBACKS**: invalid config returns an error, never a silent default
//! - **FAIL FAST**: file-read and parse errors return immediately
//! - **CLOSED SELECTORS**: optimizer and architecture are tagged enums, not
//!   strings dispatched at use sites

mod architecture;
mod optimizer;


pub use architecture::ArchitectureKind;
pub use optimizer::{AdamConfig, OptimizerHyperparameters, OptimizerKind, SgdConfig};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bins::{AgeRange, BinScheme};
use crate::error::{PredictionError, PredictionResult};

// ============================================================================
// DEFAULT FUNCTIONS
// ============================================================================

fn default_age_range() -> AgeRange {
    AgeRange {
        start: 42.0,
        end: 82.0,
    }
}

fn default_learning_rate() -> f64 {
    1e-4
}

fn default_epochs() -> usize {
    240
}

fn default_batch_size() -> usize {
    3
}

fn default_device() -> String {
    "cpu".to_string()
}

// ============================================================================
// PREDICTOR CONFIG
// ============================================================================

/// Construction inputs for a predictor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Age interval the bin scheme covers.
    #[serde(default = "default_age_range")]
    pub age_range: AgeRange,

    /// Learning rate handed to the selected optimizer.
    /// Default: 1e-4
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Epoch count for the (not yet implemented) training path.
    /// Default: 240
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Batch size for the training path.
    /// Default: 3
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Train every layer instead of only the output layer.
    /// Default: false (inner layers frozen)
    #[serde(default)]
    pub train_all_layers: bool,

    /// Network architecture selector.
    #[serde(default)]
    pub architecture: ArchitectureKind,

    /// Optimizer selector; hyperparameters beyond the learning rate are
    /// fixed per kind.
    #[serde(default)]
    pub optimizer: OptimizerKind,

    /// Optional pretrained weight snapshot, loaded at construction.
    #[serde(default)]
    pub pretrained_weights: Option<PathBuf>,

    /// Device spec: `"cpu"` or `"cuda:N"`.
    #[serde(default = "default_device")]
    pub device: String,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            age_range: default_age_range(),
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            train_all_layers: false,
            architecture: ArchitectureKind::default(),
            optimizer: OptimizerKind::default(),
            pretrained_weights: None,
            device: default_device(),
        }
    }
}

impl PredictorConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// `InvalidConfiguration` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> PredictionResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PredictionError::invalid_config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// `InvalidConfiguration` if parsing fails.
    pub fn from_toml_str(toml: &str) -> PredictionResult<Self> {
        toml::from_str(toml)
            .map_err(|e| PredictionError::invalid_config(format!("failed to parse TOML: {e}")))
    }

    /// Validate all configuration values.
    ///
    /// # Errors
    /// `InvalidConfiguration` on the first offending value: degenerate age
    /// range, range not divisible into unit bins, non-positive learning
    /// rate, or a zero epoch/batch count.
    pub fn validate(&self) -> PredictionResult<()> {
        let range = AgeRange::new(self.age_range.start, self.age_range.end)?;

        // The inference pipeline derives its geometry with unit bins.
        BinScheme::new(range, 1.0)?;

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PredictionError::invalid_config(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(PredictionError::invalid_config("epochs must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(PredictionError::invalid_config(
                "batch_size must be at least 1",
            ));
        }

        Ok(())
    }

    /// Bin count of the inference geometry (unit bins over the age range).
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.age_range.span().round() as usize
    }
}
