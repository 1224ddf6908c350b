pub mod activation;
pub mod cost;
pub mod error;
pub mod init;
pub mod layers;
pub mod math;
pub mod network;
pub mod optim;
pub mod train;
pub mod util;

// Convenience re-exports
pub use activation::{Activation, ActivationParams};
pub use cost::Cost;
pub use error::{NetError, Result};
pub use init::{Distribution, WeightsConfig};
pub use layers::{ConvLayer, FcLayer, Layer};
pub use math::Matrix;
pub use network::{LayerEntry, Network, NetworkConfig, NetworkSnapshot, State, Toggle};
pub use optim::Optimizer;
pub use train::{EpochStats, IterationReport, MiniBatchSize, Record, Shuffle, TestOptions, TrainOptions};
