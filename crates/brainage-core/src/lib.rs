//! Brain age estimation from volumetric scans.
//!
//! A convolutional network predicts a subject's age not as a raw scalar but
//! as a distribution over discretized age bins; the scalar estimate is the
//! expectation of the bin centers under that distribution. This crate
//! provides the discretization scheme, the network with its adaptation
//! logic (pretrained-weight loading, layer freezing, output-head resizing)
//! and the inference pipeline.
//!
//! # Architecture
//!
//! - [`bins`]: bin geometry, hard/soft label encoding, expectation decoding
//! - [`model`]: SFCN network, adapter and optimizers
//! - [`inference`]: single-volume prediction
//! - [`config`]: TOML-loadable construction inputs
//! - [`determinism`]: process-wide seed control
//! - [`batch`] / [`preprocess`]: batching and volume cropping support
//!
//! # Example
//!
//! ```
//! use brainage_core::bins::{decode, encode_one, AgeRange, Label};
//!
//! let range = AgeRange::new(42.0, 82.0).unwrap();
//! let encoded = encode_one(71.3, range, 1.0, 1.0).unwrap();
//! let Label::Soft(rows) = &encoded.label else { unreachable!() };
//! let estimate = decode(&rows[0], &encoded.centers).unwrap();
//! assert!((estimate - 71.3).abs() < 0.5);
//! ```

pub mod batch;
pub mod bins;
pub mod config;
pub mod determinism;
pub mod device;
pub mod error;
pub mod inference;
pub mod model;
pub mod predictor;
pub mod preprocess;

// Re-exports for convenience
pub use bins::{AgeRange, BinScheme};
pub use config::{ArchitectureKind, OptimizerKind, PredictorConfig};
pub use device::ComputeDevice;
pub use error::{PredictionError, PredictionResult};
pub use predictor::BrainAgePredictor;
