//! Compute device selection.
//!
//! Devices are addressed by the string spec the caller passes at
//! construction: `"cpu"` for host execution or `"cuda:N"` for the N-th
//! accelerator. Both tensor placement and RNG seeding key off the parsed
//! device.

use candle_core::Device;

use crate::error::{PredictionError, PredictionResult};

/// A parsed compute device plus the spec it was parsed from.
#[derive(Debug, Clone)]
pub struct ComputeDevice {
    spec: String,
    device: Device,
    accelerator: bool,
}

impl ComputeDevice {
    /// Parse a device spec.
    ///
    /// Accepted specs: `"cpu"`, `"cuda:N"` with a decimal ordinal.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for an unrecognized spec;
    /// a backend error when the requested accelerator cannot be initialized.
    pub fn parse(spec: &str) -> PredictionResult<Self> {
        if spec == "cpu" {
            return Ok(Self {
                spec: spec.to_string(),
                device: Device::Cpu,
                accelerator: false,
            });
        }

        if let Some(ordinal) = spec.strip_prefix("cuda:") {
            let ordinal: usize = ordinal.parse().map_err(|_| {
                PredictionError::invalid_config(format!(
                    "malformed accelerator ordinal in device spec '{spec}'"
                ))
            })?;
            let device = Device::new_cuda(ordinal)?;
            return Ok(Self {
                spec: spec.to_string(),
                device,
                accelerator: true,
            });
        }

        Err(PredictionError::invalid_config(format!(
            "unknown device spec '{spec}', expected 'cpu' or 'cuda:N'"
        )))
    }

    /// The backend device handle.
    #[inline]
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Whether this device takes the accelerator-specific paths
    /// (accelerator RNG seeding, deterministic-kernel latch).
    #[inline]
    #[must_use]
    pub fn is_accelerator(&self) -> bool {
        self.accelerator
    }

    /// The spec string this device was parsed from.
    #[inline]
    #[must_use]
    pub fn spec(&self) -> &str {
        &self.spec
    }
}
