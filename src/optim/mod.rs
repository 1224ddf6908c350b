pub mod max_norm;
pub mod optimizer;

pub use max_norm::max_norm_scale;
pub use optimizer::{Optimizer, ParamState};
