pub mod activation;

pub use activation::{Activation, ActivationParams};
