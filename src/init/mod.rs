pub mod distribution;

pub use distribution::{Distribution, WeightsConfig};
