//! Scoped evaluation-mode and gradient suppression.

use crate::model::Sfcn;

/// Puts the network into evaluation mode with gradient tracking disabled
/// for the lifetime of the guard.
///
/// Both flags are restored to their prior values on drop, unconditionally,
/// early returns and error paths included. Create the guard immediately
/// before the forward pass and let it fall out of scope afterwards.
#[derive(Debug)]
pub struct InferenceGuard<'a> {
    network: &'a Sfcn,
    was_training: bool,
    grad_was_enabled: bool,
}

impl<'a> InferenceGuard<'a> {
    /// Enter evaluation mode with gradients disabled.
    pub fn enter(network: &'a Sfcn) -> Self {
        let was_training = network.is_training();
        let grad_was_enabled = network.grad_enabled();
        network.set_training(false);
        network.set_grad_enabled(false);
        Self {
            network,
            was_training,
            grad_was_enabled,
        }
    }
}

impl Drop for InferenceGuard<'_> {
    fn drop(&mut self) {
        self.network.set_training(self.was_training);
        self.network.set_grad_enabled(self.grad_was_enabled);
    }
}
