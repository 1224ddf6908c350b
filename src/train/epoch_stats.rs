use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Summary of one completed training epoch.
///
/// The network keeps one of these per epoch of its most recent run; see
/// `Network::epoch_stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// Lifetime epoch number of the network, 1-based.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean cost error over the epoch's records.
    pub error: f64,
    /// Mean L2 error, only when L2 regularization is enabled.
    pub l2_error: Option<f64>,
    /// Mean L1 error, only when L1 regularization is enabled.
    pub l1_error: Option<f64>,
    /// Wall-clock time since the run started, in milliseconds.
    pub elapsed_ms: u64,
}

/// Passed to the progress callback after every iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationReport<'a> {
    /// Iterations over the network's lifetime (training), or within the run (testing).
    pub iterations: usize,
    /// Cost error of this iteration alone.
    pub error: f64,
    pub elapsed: Duration,
    pub input: &'a [f64],
}
