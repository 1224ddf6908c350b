use rand::rngs::StdRng;

use crate::network::config::Hyperparameters;

/// Network-wide state that layers read and update while they run.
///
/// Layers never hold a reference to their network; every layer operation
/// that needs shared settings or accumulators receives this explicitly.
#[derive(Debug, Clone)]
pub struct NetContext {
    pub hp: Hyperparameters,
    pub rng: StdRng,
    /// Samples per weight update of the current training run.
    pub mini_batch_size: usize,
    /// Iterations completed over the network's lifetime.
    pub iterations: usize,
    /// Only grows while `hp.l1` is set.
    pub l1_error: f64,
    /// Only grows while `hp.l2` is set.
    pub l2_error: f64,
    /// Sum of squared weights gathered during an apply step, while `hp.max_norm` is set.
    pub max_norm_total: f64,
}

impl NetContext {
    pub fn new(hp: Hyperparameters, rng: StdRng) -> Self {
        NetContext {
            hp,
            rng,
            mini_batch_size: 1,
            iterations: 0,
            l1_error: 0.0,
            l2_error: 0.0,
            max_norm_total: 0.0,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.hp.learning_rate.unwrap_or_default()
    }

    /// Combined L1 + L2 coefficient, spread over the mini-batch.
    pub fn regularization(&self) -> f64 {
        (self.hp.l1.unwrap_or(0.0) + self.hp.l2.unwrap_or(0.0)) / self.mini_batch_size as f64
    }

    /// Adds the penalty terms of one weight to the running L1/L2 errors.
    pub fn track_regularization(&mut self, weight: f64) {
        let batch = self.mini_batch_size as f64;
        if let Some(l2) = self.hp.l2 {
            self.l2_error += 0.5 * l2 * weight * weight / batch;
        }
        if let Some(l1) = self.hp.l1 {
            self.l1_error += l1 * weight.abs() / batch;
        }
    }

    pub fn track_norm(&mut self, weight: f64) {
        if self.hp.max_norm.is_some() {
            self.max_norm_total += weight * weight;
        }
    }
}
