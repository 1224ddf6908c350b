use std::fmt;

use log::debug;
use rand::rngs::StdRng;
use serde::{Deserialize, Deserializer};

use crate::activation::{Activation, ActivationParams};
use crate::cost::Cost;
use crate::error::Result;
use crate::init::{Distribution, WeightsConfig};
use crate::layers::{ConvLayer, FcLayer, Layer};
use crate::optim::Optimizer;

/// A flag-or-number option: `true` selects a fixed default, `false` (or a
/// zero value) disables the feature, any other number is used verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Toggle {
    Flag(bool),
    Value(f64),
}

impl Toggle {
    pub fn resolve(self, default: f64) -> Option<f64> {
        match self {
            Toggle::Flag(true) => Some(default),
            Toggle::Flag(false) => None,
            Toggle::Value(v) if v == 0.0 => None,
            Toggle::Value(v) => Some(v),
        }
    }
}

impl From<bool> for Toggle {
    fn from(value: bool) -> Self {
        Toggle::Flag(value)
    }
}

impl From<f64> for Toggle {
    fn from(value: f64) -> Self {
        Toggle::Value(value)
    }
}

/// `adaptiveLR` accepts a rule name, or `false`/`null` for plain SGD.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptimizerChoice {
    Disabled(bool),
    Named(String),
}

/// One entry of the `layers` option: a neuron count, or a ready-made layer.
pub enum LayerEntry {
    Size(i64),
    Layer(Box<dyn Layer>),
}

impl fmt::Debug for LayerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerEntry::Size(size) => write!(f, "Size({size})"),
            LayerEntry::Layer(layer) => write!(f, "Layer(size = {})", layer.size()),
        }
    }
}

impl<'de> Deserialize<'de> for LayerEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        i64::deserialize(deserializer).map(LayerEntry::Size)
    }
}

impl From<usize> for LayerEntry {
    fn from(value: usize) -> Self {
        LayerEntry::Size(value as i64)
    }
}

impl From<FcLayer> for LayerEntry {
    fn from(value: FcLayer) -> Self {
        LayerEntry::Layer(Box::new(value))
    }
}

impl From<ConvLayer> for LayerEntry {
    fn from(value: ConvLayer) -> Self {
        LayerEntry::Layer(Box::new(value))
    }
}

impl From<Box<dyn Layer>> for LayerEntry {
    fn from(value: Box<dyn Layer>) -> Self {
        LayerEntry::Layer(value)
    }
}

/// The `weightsConfig` option.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeightsOptions {
    pub distribution: Option<String>,
    pub limit: Option<f64>,
    pub mean: Option<f64>,
    pub std_deviation: Option<f64>,
}

/// Every construction option of a `Network`. All fields are optional.
///
/// The JSON shape uses camelCase keys (`learningRate`, `adaptiveLR`,
/// `weightsConfig`, ...). Callables cannot come from JSON; set them with the
/// `with_*` methods.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    pub learning_rate: Option<f64>,
    pub layers: Vec<LayerEntry>,
    #[serde(rename = "adaptiveLR")]
    pub adaptive_lr: Option<OptimizerChoice>,
    pub activation: Option<String>,
    pub cost: Option<String>,
    pub rms_decay: Option<f64>,
    pub rho: Option<f64>,
    pub lrelu_slope: Option<f64>,
    pub elu_alpha: Option<f64>,
    /// Keep-probability; `1` (the default) disables dropout.
    pub dropout: Option<Toggle>,
    pub l2: Option<Toggle>,
    pub l1: Option<Toggle>,
    pub max_norm: Option<Toggle>,
    pub weights_config: Option<WeightsOptions>,
    pub filter_size: Option<usize>,
    pub zero_padding: Option<usize>,
    pub stride: Option<usize>,
    pub channels: Option<usize>,
    pub filter_count: Option<usize>,
    /// Seeds weight initialisation, dropout and shuffling.
    pub seed: Option<u64>,

    #[serde(skip)]
    pub custom_activation: Option<fn(f64, bool) -> f64>,
    #[serde(skip)]
    pub custom_cost: Option<fn(&[f64], &[f64]) -> f64>,
    #[serde(skip)]
    pub custom_optimizer: Option<fn(f64, f64, f64) -> f64>,
    #[serde(skip)]
    pub custom_distribution: Option<fn(usize, &WeightsConfig, &mut StdRng) -> Vec<f64>>,
}

/// Options forwarded to convolutional layers that do not set their own.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConvDefaults {
    pub filter_size: Option<usize>,
    pub zero_padding: Option<usize>,
    pub stride: Option<usize>,
    pub channels: Option<usize>,
    pub filter_count: Option<usize>,
}

/// Fully resolved, immutable hyperparameters of a network.
#[derive(Debug, Clone)]
pub struct Hyperparameters {
    /// `None` only for adadelta without an explicit rate.
    pub learning_rate: Option<f64>,
    pub optimizer: Optimizer,
    pub activation: Activation,
    pub activation_params: ActivationParams,
    pub cost: Cost,
    pub dropout: f64,
    pub l1: Option<f64>,
    pub l2: Option<f64>,
    pub max_norm: Option<f64>,
    pub weights_config: WeightsConfig,
    pub conv: ConvDefaults,
}

impl NetworkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a config from a JSON file.
    pub fn load_json(path: &str) -> Result<NetworkConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn with_layers<I, L>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LayerEntry>,
    {
        self.layers = layers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = Some(learning_rate);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_activation_fn(mut self, f: fn(f64, bool) -> f64) -> Self {
        self.custom_activation = Some(f);
        self
    }

    pub fn with_cost_fn(mut self, f: fn(&[f64], &[f64]) -> f64) -> Self {
        self.custom_cost = Some(f);
        self
    }

    pub fn with_optimizer_fn(mut self, f: fn(f64, f64, f64) -> f64) -> Self {
        self.custom_optimizer = Some(f);
        self
    }

    pub fn with_distribution_fn(mut self, f: fn(usize, &WeightsConfig, &mut StdRng) -> Vec<f64>) -> Self {
        self.custom_distribution = Some(f);
        self
    }

    /// Applies every defaulting rule, in order: selector names, regularization,
    /// learning rate, optimizer, weight distribution.
    pub fn resolve(&self) -> Result<Hyperparameters> {
        // Names
        let activation = match self.custom_activation {
            Some(f) => Activation::Custom(f),
            None => Activation::from_name(self.activation.as_deref().unwrap_or("sigmoid"))?,
        };
        let cost = match self.custom_cost {
            Some(f) => Cost::Custom(f),
            None => Cost::from_name(self.cost.as_deref().unwrap_or("meansquarederror"))?,
        };
        let optimizer = match (self.custom_optimizer, &self.adaptive_lr) {
            (Some(f), _) => Optimizer::Custom(f),
            (None, None) | (None, Some(OptimizerChoice::Disabled(_))) => Optimizer::NoAdaptiveLr,
            (None, Some(OptimizerChoice::Named(name))) => Optimizer::from_name(name)?,
        };

        // Regularization
        let l2 = self.l2.and_then(|t| t.resolve(0.001));
        let l1 = self.l1.and_then(|t| t.resolve(0.005));
        let max_norm = self.max_norm.and_then(|t| t.resolve(1000.0));

        // Learning rate, then the optimizer's own parameters
        let (learning_rate, optimizer) = match optimizer {
            Optimizer::RmsProp { decay } => (
                Some(self.learning_rate.unwrap_or(0.001)),
                Optimizer::RmsProp { decay: self.rms_decay.unwrap_or(decay) },
            ),
            Optimizer::Adam => (Some(self.learning_rate.unwrap_or(0.01)), optimizer),
            Optimizer::Adadelta { rho } => (
                self.learning_rate,
                Optimizer::Adadelta { rho: self.rho.unwrap_or(rho) },
            ),
            _ => (
                Some(self.learning_rate.unwrap_or_else(|| activation.default_learning_rate())),
                optimizer,
            ),
        };

        // Weight distribution
        let mut weights_config = WeightsConfig::default();
        let options = self.weights_config.clone().unwrap_or_default();
        if let Some(name) = options.distribution.as_deref() {
            weights_config.distribution = Distribution::from_name(name)?;
        }
        match weights_config.distribution {
            Distribution::Uniform => weights_config.limit = Some(options.limit.unwrap_or(0.1)),
            Distribution::Gaussian => {
                weights_config.mean = Some(options.mean.unwrap_or(0.0));
                weights_config.std_deviation =
                    Some(options.std_deviation.filter(|s| *s != 0.0).unwrap_or(0.05));
            }
            _ => {}
        }
        if let Some(f) = self.custom_distribution {
            weights_config.distribution = Distribution::Custom(f);
        }

        let defaults = ActivationParams::default();
        let hp = Hyperparameters {
            learning_rate,
            optimizer,
            activation,
            activation_params: ActivationParams {
                lrelu_slope: self.lrelu_slope.unwrap_or(defaults.lrelu_slope),
                elu_alpha: self.elu_alpha.unwrap_or(defaults.elu_alpha),
            },
            cost,
            dropout: match self.dropout {
                Some(Toggle::Value(v)) if v != 0.0 => v,
                _ => 1.0,
            },
            l1,
            l2,
            max_norm,
            weights_config,
            conv: ConvDefaults {
                filter_size: self.filter_size,
                zero_padding: self.zero_padding,
                stride: self.stride,
                channels: self.channels,
                filter_count: self.filter_count,
            },
        };
        debug!(
            "resolved hyperparameters: activation={} optimizer={} learning_rate={:?}",
            hp.activation.name(),
            hp.optimizer.name(),
            hp.learning_rate
        );
        Ok(hp)
    }
}
