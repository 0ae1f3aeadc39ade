//! Network architecture selection.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PredictionError;

/// Supported network architectures. Currently one variant; the selector is
/// closed so an unknown name fails at parse time instead of at dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchitectureKind {
    /// Simple Fully Convolutional Network for volumetric regression by
    /// soft classification.
    #[default]
    Sfcn,
}

impl FromStr for ArchitectureKind {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sfcn" => Ok(Self::Sfcn),
            other => Err(PredictionError::invalid_config(format!(
                "unknown architecture '{other}', expected 'sfcn'"
            ))),
        }
    }
}
