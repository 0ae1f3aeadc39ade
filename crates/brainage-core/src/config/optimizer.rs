//! Optimizer selection.
//!
//! The optimizer is a closed selector; everything beyond the learning rate
//! is fixed per kind and carried in an explicit hyperparameter record.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PredictionError;

/// Which parameter optimizer to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

impl OptimizerKind {
    /// The fixed hyperparameter record for this kind.
    #[must_use]
    pub fn hyperparameters(self) -> OptimizerHyperparameters {
        match self {
            Self::Adam => OptimizerHyperparameters::Adam(AdamConfig::default()),
            Self::Sgd => OptimizerHyperparameters::Sgd(SgdConfig::default()),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adam" => Ok(Self::Adam),
            "sgd" => Ok(Self::Sgd),
            other => Err(PredictionError::invalid_config(format!(
                "unknown optimizer '{other}', expected 'adam' or 'sgd'"
            ))),
        }
    }
}

/// Fixed Adam hyperparameters: `betas = (0.9, 0.999)`, `eps = 1e-8`, no
/// weight decay, no AMSGrad.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub weight_decay: f64,
    pub amsgrad: bool,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
            amsgrad: false,
        }
    }
}

/// Fixed SGD hyperparameters: `momentum = 0.9`, `weight_decay = 0.001`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SgdConfig {
    pub momentum: f64,
    pub weight_decay: f64,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            momentum: 0.9,
            weight_decay: 0.001,
        }
    }
}

/// Hyperparameters tagged by optimizer kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerHyperparameters {
    Adam(AdamConfig),
    Sgd(SgdConfig),
}
