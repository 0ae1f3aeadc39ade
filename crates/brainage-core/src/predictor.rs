//! Construction facade wiring configuration to a ready predictor.

use candle_core::Tensor;
use tracing::{info, warn};

use crate::bins::BinScheme;
use crate::config::PredictorConfig;
use crate::device::ComputeDevice;
use crate::error::PredictionResult;
use crate::inference::InferenceEngine;
use crate::model::{ModelAdapter, Optimizer};

/// An age predictor assembled from a validated configuration.
///
/// Construction performs the whole adaptation sequence: build the selected
/// architecture on the configured device, load pretrained weights when a
/// snapshot is given, resize the output layer to the configured age range,
/// freeze the inner layers unless full training was requested, and select
/// the optimizer. Every step is fatal on failure; a constructed predictor
/// is fully usable.
///
/// # Example
///
/// ```rust,ignore
/// use brainage_core::{BrainAgePredictor, PredictorConfig};
///
/// let config = PredictorConfig::from_file("predictor.toml")?;
/// let predictor = BrainAgePredictor::new(config)?;
/// let age = predictor.predict(&volume)?;
/// ```
pub struct BrainAgePredictor {
    config: PredictorConfig,
    adapter: ModelAdapter,
    optimizer: Optimizer,
    scheme: BinScheme,
}

impl BrainAgePredictor {
    /// Validate the configuration and build the predictor.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` from config validation or device parsing.
    /// - `ResourceLoad` when the pretrained snapshot cannot be applied.
    pub fn new(config: PredictorConfig) -> PredictionResult<Self> {
        config.validate()?;
        let device = ComputeDevice::parse(&config.device)?;

        let mut adapter = ModelAdapter::new(config.architecture, &device)?;
        if let Some(path) = &config.pretrained_weights {
            adapter.load_pretrained(path)?;
        }

        adapter.adapt_output_layer(config.bin_count())?;
        if !config.train_all_layers {
            adapter.freeze_inner_layers();
        }
        let optimizer = adapter.select_optimizer(config.optimizer, config.learning_rate)?;

        let scheme = BinScheme::new(config.age_range, 1.0)?;
        info!(
            start = config.age_range.start,
            end = config.age_range.end,
            bins = scheme.bin_count(),
            device = device.spec(),
            "predictor ready"
        );

        Ok(Self {
            config,
            adapter,
            optimizer,
            scheme,
        })
    }

    /// Predict the age for one preprocessed scan volume.
    ///
    /// See [`InferenceEngine::predict`] for accepted shapes and errors.
    pub fn predict(&self, volume: &Tensor) -> PredictionResult<f64> {
        let engine = InferenceEngine::new(&self.adapter, self.config.age_range)?;
        engine.predict(volume)
    }

    /// Training entry point. Not implemented: no loss or optimization loop
    /// is defined yet, so this logs and returns with the network untouched.
    pub fn fit<I>(&mut self, _samples: I)
    where
        I: IntoIterator<Item = (Tensor, f64)>,
    {
        warn!(
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            "training is not implemented; fit leaves the network untouched"
        );
    }

    /// The model adapter owning the network state.
    #[inline]
    #[must_use]
    pub fn adapter(&self) -> &ModelAdapter {
        &self.adapter
    }

    /// The optimizer selected at construction.
    #[inline]
    #[must_use]
    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    /// The configuration this predictor was built from.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }
}

impl std::fmt::Debug for BrainAgePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrainAgePredictor")
            .field("age_range", &self.config.age_range)
            .field("bins", &self.scheme.bin_count())
            .field("optimizer", &self.optimizer)
            .finish()
    }
}
