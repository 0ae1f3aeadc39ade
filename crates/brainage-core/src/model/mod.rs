//! Network architecture, adaptation and parameter optimization.
//!
//! [`ModelAdapter`] owns the network state and repurposes pretrained
//! weights for a new target range: freezing inner layers, resizing the
//! output head and constructing optimizers over whatever is currently
//! trainable.

mod adapter;
pub(crate) mod ops;
mod optim;
mod sfcn;
mod state;

#[cfg(test)]
mod tests;

pub use adapter::ModelAdapter;
pub use optim::Optimizer;
pub use sfcn::{Sfcn, DEFAULT_OUTPUT_BINS, OUTPUT_LAYER};
pub use state::NetworkState;
