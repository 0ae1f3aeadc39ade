//! Parameter optimizers over the trainable subset of the network.
//!
//! An optimizer captures the trainable parameters and the network
//! generation at construction. Freezing or adapting the network afterwards
//! bumps the generation, and every subsequent use of the old optimizer is
//! rejected with `StaleOptimizer`; it must be reconstructed, never reused.

use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};

use crate::config::{AdamConfig, OptimizerHyperparameters, OptimizerKind, SgdConfig};
use crate::error::{PredictionError, PredictionResult};

use super::state::NetworkState;

enum Update {
    Adam {
        config: AdamConfig,
        step_count: i32,
        first_moments: Vec<Tensor>,
        second_moments: Vec<Tensor>,
    },
    Sgd {
        config: SgdConfig,
        velocities: Vec<Tensor>,
    },
}

/// An Adam or SGD optimizer bound to one network generation.
pub struct Optimizer {
    kind: OptimizerKind,
    params: Vec<(String, Var)>,
    learning_rate: f64,
    generation: u64,
    update: Update,
}

impl Optimizer {
    pub(crate) fn new(
        kind: OptimizerKind,
        learning_rate: f64,
        params: Vec<(String, Var)>,
        generation: u64,
    ) -> PredictionResult<Self> {
        let zeros = |params: &[(String, Var)]| -> PredictionResult<Vec<Tensor>> {
            params
                .iter()
                .map(|(_, var)| Ok(var.as_tensor().zeros_like()?))
                .collect()
        };

        let update = match kind.hyperparameters() {
            OptimizerHyperparameters::Adam(config) => Update::Adam {
                config,
                step_count: 0,
                first_moments: zeros(&params)?,
                second_moments: zeros(&params)?,
            },
            OptimizerHyperparameters::Sgd(config) => Update::Sgd {
                config,
                velocities: zeros(&params)?,
            },
        };

        Ok(Self {
            kind,
            params,
            learning_rate,
            generation,
            update,
        })
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> OptimizerKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// The network generation this optimizer was built against.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of parameters under optimization.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    /// Reject use against a network that has been frozen or adapted since
    /// this optimizer was built.
    ///
    /// # Errors
    /// `StaleOptimizer` on generation mismatch.
    pub fn ensure_fresh(&self, state: &NetworkState) -> PredictionResult<()> {
        if self.generation != state.generation() {
            return Err(PredictionError::StaleOptimizer {
                built_at: self.generation,
                current: state.generation(),
            });
        }
        Ok(())
    }

    /// Apply one update step from accumulated gradients. Parameters without
    /// a gradient entry are left untouched.
    ///
    /// # Errors
    /// `StaleOptimizer` when the network has moved on; backend errors from
    /// tensor arithmetic.
    pub fn step(&mut self, grads: &GradStore, state: &NetworkState) -> PredictionResult<()> {
        self.ensure_fresh(state)?;
        let lr = self.learning_rate;

        match &mut self.update {
            Update::Adam {
                config,
                step_count,
                first_moments,
                second_moments,
            } => {
                *step_count += 1;
                let bias1 = 1.0 - config.beta1.powi(*step_count);
                let bias2 = 1.0 - config.beta2.powi(*step_count);

                for (index, (_, var)) in self.params.iter().enumerate() {
                    let Some(grad) = grads.get(var.as_tensor()) else {
                        continue;
                    };
                    let grad = decayed(grad, var, config.weight_decay)?;

                    let m = ((&first_moments[index] * config.beta1)?
                        + (&grad * (1.0 - config.beta1))?)?;
                    let v = ((&second_moments[index] * config.beta2)?
                        + (grad.sqr()? * (1.0 - config.beta2))?)?;

                    let m_hat = (&m / bias1)?;
                    let v_hat = (&v / bias2)?;
                    let delta = ((m_hat * lr)? / (v_hat.sqrt()? + config.eps)?)?;
                    var.set(&(var.as_tensor() - delta)?)?;

                    first_moments[index] = m;
                    second_moments[index] = v;
                }
            }
            Update::Sgd { config, velocities } => {
                for (index, (_, var)) in self.params.iter().enumerate() {
                    let Some(grad) = grads.get(var.as_tensor()) else {
                        continue;
                    };
                    let grad = decayed(grad, var, config.weight_decay)?;

                    let velocity = ((&velocities[index] * config.momentum)? + grad)?;
                    var.set(&(var.as_tensor() - (&velocity * lr)?)?)?;
                    velocities[index] = velocity;
                }
            }
        }

        Ok(())
    }
}

fn decayed(grad: &Tensor, var: &Var, weight_decay: f64) -> PredictionResult<Tensor> {
    if weight_decay > 0.0 {
        Ok((grad + (var.as_tensor() * weight_decay)?)?)
    } else {
        Ok(grad.clone())
    }
}

impl std::fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Optimizer")
            .field("kind", &self.kind)
            .field("learning_rate", &self.learning_rate)
            .field("generation", &self.generation)
            .field("parameters", &self.params.len())
            .finish()
    }
}
