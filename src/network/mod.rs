pub mod checkpoint;
pub mod config;
pub mod context;
pub mod network;

pub use checkpoint::{LayerSnapshot, NetworkSnapshot, UnitSnapshot, UnitWeights};
pub use config::{ConvDefaults, Hyperparameters, LayerEntry, NetworkConfig, Toggle, WeightsOptions};
pub use context::NetContext;
pub use network::{Network, State};
