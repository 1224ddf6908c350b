use crate::error::{NetError, Result};
use crate::util::format_name;

/// Scalars that parameterise some activations, resolved once from the network config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationParams {
    /// Negative-side slope for `LeakyRelu`.
    pub lrelu_slope: f64,
    /// Saturation value for `Elu`.
    pub elu_alpha: f64,
}

impl Default for ActivationParams {
    fn default() -> Self {
        ActivationParams {
            lrelu_slope: -0.0005,
            elu_alpha: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Activation {
    Sigmoid,
    Tanh,
    Relu,
    LeakyRelu,
    /// Leaky ReLU whose slope is drawn per neuron when the layer is initialised.
    RandomizedRelu,
    /// LeCun's scaled tanh: `1.7159 * tanh(2x / 3)`.
    LecunTanh,
    Elu,
    /// Caller-supplied `f(x, derivative)`.
    Custom(fn(f64, bool) -> f64),
}

impl Activation {
    /// Looks up an activation by name. The name is normalised first, so
    /// `"Leaky-ReLU"` and `"lrelu"` select the same function.
    pub fn from_name(name: &str) -> Result<Activation> {
        match format_name(name).as_str() {
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "relu" => Ok(Activation::Relu),
            "lrelu" | "leakyrelu" => Ok(Activation::LeakyRelu),
            "rrelu" | "randomizedrelu" => Ok(Activation::RandomizedRelu),
            "lecuntanh" | "scaledtanh" => Ok(Activation::LecunTanh),
            "elu" => Ok(Activation::Elu),
            other => Err(NetError::UnknownActivation(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Relu => "relu",
            Activation::LeakyRelu => "lrelu",
            Activation::RandomizedRelu => "rrelu",
            Activation::LecunTanh => "lecuntanh",
            Activation::Elu => "elu",
            Activation::Custom(_) => "custom",
        }
    }

    /// Learning rate picked when neither the caller nor the optimizer chose one.
    pub fn default_learning_rate(&self) -> f64 {
        match self {
            Activation::Relu | Activation::LeakyRelu | Activation::RandomizedRelu | Activation::Elu => 0.01,
            Activation::Tanh | Activation::LecunTanh => 0.001,
            _ => 0.2,
        }
    }

    /// Element-wise activation. `rrelu_slope` is the owning neuron's slope and
    /// is only read by `RandomizedRelu`.
    pub fn function(&self, x: f64, params: &ActivationParams, rrelu_slope: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::LeakyRelu => if x > 0.0 { x } else { params.lrelu_slope * x },
            Activation::RandomizedRelu => if x > 0.0 { x } else { rrelu_slope * x },
            Activation::LecunTanh => 1.7159 * (2.0 * x / 3.0).tanh(),
            Activation::Elu => {
                if x >= 0.0 { x } else { params.elu_alpha * (x.exp() - 1.0) }
            }
            Activation::Custom(f) => f(x, false),
        }
    }

    /// Element-wise derivative, evaluated at the pre-activation sum.
    pub fn derivative(&self, x: f64, params: &ActivationParams, rrelu_slope: f64) -> f64 {
        match self {
            Activation::Sigmoid => {
                let fx = self.function(x, params, rrelu_slope);
                fx * (1.0 - fx)
            }
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            Activation::Relu => if x > 0.0 { 1.0 } else { 0.0 },
            Activation::LeakyRelu => if x > 0.0 { 1.0 } else { params.lrelu_slope },
            Activation::RandomizedRelu => if x > 0.0 { 1.0 } else { rrelu_slope },
            Activation::LecunTanh => {
                let t = (2.0 * x / 3.0).tanh();
                1.7159 * 2.0 / 3.0 * (1.0 - t * t)
            }
            Activation::Elu => {
                if x >= 0.0 { 1.0 } else { self.function(x, params, rrelu_slope) + params.elu_alpha }
            }
            Activation::Custom(f) => f(x, true),
        }
    }
}
