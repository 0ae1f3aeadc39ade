//! Core error types for the age-prediction pipeline.
//!
//! # Error Categories
//!
//! | Category | Variants | Recovery Strategy |
//! |----------|----------|-------------------|
//! | Configuration | InvalidConfiguration | Fix range/step, optimizer or architecture selection |
//! | Shape | ShapeMismatch, UnsupportedRank | Fix input volume or bin geometry |
//! | Resources | ResourceLoad | Fix weight file path or regenerate snapshot |
//! | Lifecycle | StaleOptimizer | Rebuild the optimizer after freeze/adapt |
//! | Backend | Tensor | Inspect device/tensor state |
//!
//! # Design Principles
//!
//! - **NO SENTINELS**: invalid input is an error value, never a `-1` the
//!   caller could mistake for data
//! - **FAIL FAST**: construction-time failures abort construction
//! - **CONTEXTUAL**: every variant carries the values that tripped it

use thiserror::Error;

/// Failure modes of the prediction pipeline.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Invalid range/step pair, negative spread, or unknown selector.
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Vector/tensor extent disagrees with what the geometry requires.
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Volume rank outside the supported 3/4/5-D set.
    #[error("Unsupported volume rank {rank}: only 3-D, 4-D and 5-D inputs are accepted")]
    UnsupportedRank { rank: usize },

    /// Pretrained weight snapshot missing, unreadable or shape-incompatible.
    /// Fatal at construction; never retried.
    #[error("Weight load failed for '{path}': {message}")]
    ResourceLoad { path: String, message: String },

    /// An optimizer built before a freeze/adapt operation was used afterwards.
    #[error(
        "Stale optimizer: built at network generation {built_at}, network is now at {current}"
    )]
    StaleOptimizer { built_at: u64, current: u64 },

    /// Tensor backend failure (device, dtype, kernel).
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl PredictionError {
    /// Shorthand for an `InvalidConfiguration` with a formatted message.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type alias for pipeline operations.
pub type PredictionResult<T> = Result<T, PredictionError>;
