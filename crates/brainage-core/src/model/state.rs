//! Ownership wrapper around the network: parameters, trainable flags and
//! the generation counter that invalidates stale optimizers.

use std::collections::BTreeMap;

use candle_core::Var;

use super::sfcn::Sfcn;

/// The network plus its adaptation bookkeeping.
///
/// Owned exclusively by [`ModelAdapter`](super::ModelAdapter); the
/// inference engine borrows it read-only. Every freeze or output-layer
/// replacement bumps `generation`, which optimizers check before touching
/// parameters.
#[derive(Debug)]
pub struct NetworkState {
    network: Sfcn,
    trainable: BTreeMap<String, bool>,
    generation: u64,
}

impl NetworkState {
    pub(crate) fn new(network: Sfcn) -> Self {
        let trainable = network
            .named_parameters()
            .into_iter()
            .map(|(name, _)| (name, true))
            .collect();
        Self {
            network,
            trainable,
            generation: 0,
        }
    }

    /// Read-only view of the network.
    #[inline]
    #[must_use]
    pub fn network(&self) -> &Sfcn {
        &self.network
    }

    pub(crate) fn network_mut(&mut self) -> &mut Sfcn {
        &mut self.network
    }

    /// Monotone counter bumped by freeze/adapt operations.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation += 1;
    }

    /// Whether the named parameter may be updated by an optimizer.
    #[must_use]
    pub fn is_trainable(&self, name: &str) -> bool {
        self.trainable.get(name).copied().unwrap_or(false)
    }

    /// The currently trainable parameters, in canonical order.
    #[must_use]
    pub fn trainable_parameters(&self) -> Vec<(String, Var)> {
        self.network
            .named_parameters()
            .into_iter()
            .filter(|(name, _)| self.is_trainable(name))
            .collect()
    }

    pub(crate) fn set_all_trainable(&mut self, trainable: bool) {
        for flag in self.trainable.values_mut() {
            *flag = trainable;
        }
    }

    pub(crate) fn set_trainable(&mut self, name: &str, trainable: bool) {
        if let Some(flag) = self.trainable.get_mut(name) {
            *flag = trainable;
        }
    }
}
