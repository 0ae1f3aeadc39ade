//! Error types for the prediction pipeline.

mod types;


pub use types::{PredictionError, PredictionResult};
