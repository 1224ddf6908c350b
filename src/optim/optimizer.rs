use crate::error::{NetError, Result};
use crate::util::format_name;

/// Per-parameter history kept by the adaptive optimizers.
///
/// Every weight and every bias owns one. Plain SGD never touches it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamState {
    /// Running sum (adagrad) or running average (rmsprop, adadelta) of squared deltas.
    pub cache: f64,
    /// Adam first moment.
    pub m: f64,
    /// Adam second moment.
    pub v: f64,
    /// Adadelta running average of squared updates.
    pub adadelta_cache: f64,
}

/// Weight update rule, resolved once when the network is built.
///
/// Deltas follow the `expected - actual` sign convention, so every rule adds
/// the scaled delta to the current value.
#[derive(Debug, Clone, Copy)]
pub enum Optimizer {
    /// `value + lr * delta`
    NoAdaptiveLr,
    Adagrad,
    RmsProp { decay: f64 },
    /// Moves a parameter even for a zero delta once its momentum `m` is
    /// non-zero, so a reset followed by an apply only leaves weights
    /// unchanged while no update has been applied yet.
    Adam,
    /// Needs no learning rate.
    Adadelta { rho: f64 },
    /// Caller-supplied `f(value, delta, learning_rate)`.
    Custom(fn(f64, f64, f64) -> f64),
}

impl Optimizer {
    /// Looks up a rule by name with its default parameters.
    pub fn from_name(name: &str) -> Result<Optimizer> {
        match format_name(name).as_str() {
            "" | "false" | "null" | "none" | "noadaptivelr" => Ok(Optimizer::NoAdaptiveLr),
            "adagrad" => Ok(Optimizer::Adagrad),
            "rmsprop" => Ok(Optimizer::RmsProp { decay: 0.99 }),
            "adam" => Ok(Optimizer::Adam),
            "adadelta" => Ok(Optimizer::Adadelta { rho: 0.95 }),
            other => Err(NetError::UnknownOptimizer(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Optimizer::NoAdaptiveLr => "noadaptivelr",
            Optimizer::Adagrad => "adagrad",
            Optimizer::RmsProp { .. } => "rmsprop",
            Optimizer::Adam => "adam",
            Optimizer::Adadelta { .. } => "adadelta",
            Optimizer::Custom(_) => "custom",
        }
    }

    /// Returns the updated `value`. `iterations` is the network's global
    /// iteration counter, used for Adam's bias correction.
    pub fn step(
        &self,
        value: f64,
        delta: f64,
        state: &mut ParamState,
        learning_rate: f64,
        iterations: usize,
    ) -> f64 {
        match *self {
            Optimizer::NoAdaptiveLr => value + learning_rate * delta,
            Optimizer::Adagrad => {
                state.cache += delta.powi(2);
                value + learning_rate * delta / (1e-6 + state.cache.sqrt())
            }
            Optimizer::RmsProp { decay } => {
                state.cache = decay * state.cache + (1.0 - decay) * delta.powi(2);
                value + learning_rate * delta / (1e-6 + state.cache.sqrt())
            }
            Optimizer::Adam => {
                let t = iterations as i32 + 1;
                state.m = 0.9 * state.m + (1.0 - 0.9) * delta;
                let mt = state.m / (1.0 - 0.9f64.powi(t));
                state.v = 0.999 * state.v + (1.0 - 0.999) * delta.powi(2);
                let vt = state.v / (1.0 - 0.999f64.powi(t));
                value + learning_rate * mt / (vt.sqrt() + 1e-8)
            }
            Optimizer::Adadelta { rho } => {
                state.cache = rho * state.cache + (1.0 - rho) * delta.powi(2);
                let update = ((state.adadelta_cache + 1e-6) / (state.cache + 1e-6)).sqrt() * delta;
                state.adadelta_cache = rho * state.adadelta_cache + (1.0 - rho) * update.powi(2);
                value + update
            }
            Optimizer::Custom(f) => f(value, delta, learning_rate),
        }
    }
}
