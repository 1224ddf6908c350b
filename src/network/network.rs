use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{NetError, Result};
use crate::layers::{FcLayer, Layer};
use crate::network::checkpoint::NetworkSnapshot;
use crate::network::config::{Hyperparameters, LayerEntry, NetworkConfig};
use crate::network::context::NetContext;
use crate::optim::max_norm_scale;
use crate::train::EpochStats;

/// Lifecycle of a network and of each of its layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// No layers yet; they are sized from the first training record.
    #[default]
    NotDefined,
    Constructed,
    Initialised,
    /// Only while a `train` run is in flight.
    Training,
}

/// A sequential stack of layers plus everything needed to run and train it.
pub struct Network {
    pub(crate) state: State,
    pub(crate) layers: Vec<Box<dyn Layer>>,
    pub(crate) ctx: NetContext,
    pub(crate) epochs: usize,
    /// Summed cost error of the current (or last) epoch.
    pub(crate) error: f64,
    pub(crate) epoch_stats: Vec<EpochStats>,
}

impl Network {
    /// Checkpoint format version.
    pub const VERSION: &'static str = "2.0.0";

    /// Resolves `config` and, when layers are given, assembles and initialises them.
    pub fn new(config: NetworkConfig) -> Result<Network> {
        let hp = config.resolve()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut network = Network {
            state: State::NotDefined,
            layers: Vec::new(),
            ctx: NetContext::new(hp, rng),
            epochs: 0,
            error: 0.0,
            epoch_stats: Vec::new(),
        };

        if config.layers.is_empty() {
            debug!("no layers given, sizing is deferred to the first training run");
            return Ok(network);
        }

        network.layers = build_layers(config.layers)?;
        network.state = State::Constructed;
        debug!("constructed network with {} layers", network.layers.len());
        network.init_layers(0, 0)?;
        Ok(network)
    }

    /// Links and initialises every layer. A no-op once initialised.
    ///
    /// Without layers, three fully-connected layers are synthesised for
    /// `input` inputs and `expected` outputs first.
    pub fn init_layers(&mut self, input: usize, expected: usize) -> Result<()> {
        match self.state {
            State::Initialised | State::Training => return Ok(()),
            State::NotDefined => {
                if input == 0 || expected == 0 {
                    return Err(NetError::InvalidLayers);
                }
                let hidden = hidden_size(input, expected);
                debug!("auto-sizing layers: {input} -> {hidden} -> {expected}");
                self.layers = vec![
                    Box::new(FcLayer::new(input)),
                    Box::new(FcLayer::new(hidden)),
                    Box::new(FcLayer::new(expected)),
                ];
            }
            State::Constructed => {}
        }

        for index in 0..self.layers.len() {
            self.join_layer(index)?;
        }
        self.state = State::Initialised;
        Ok(())
    }

    fn join_layer(&mut self, index: usize) -> Result<()> {
        let (before, rest) = self.layers.split_at_mut(index);
        let layer = &mut rest[0];

        layer.attach(&self.ctx);
        if layer.activation().is_none() {
            layer.set_activation(self.ctx.hp.activation);
        }
        *layer.weights_config_mut() = self.ctx.hp.weights_config.clone();

        if let Some(prev) = before.last_mut() {
            prev.assign_next(index);
            layer.assign_prev(index - 1);
            layer.weights_config_mut().fan_in = Some(prev.size());
            prev.weights_config_mut().fan_out = Some(layer.size());

            layer.init(prev.as_ref(), &mut self.ctx)?;
            layer.set_state(State::Initialised);
        }
        Ok(())
    }

    /// Runs `input` through every layer and returns the output activations.
    ///
    /// An empty `input` counts as no input at all and fails with
    /// `MissingData`; any other length mismatch is only a warning.
    pub fn forward(&mut self, input: &[f64]) -> Result<Vec<f64>> {
        if !self.is_ready() {
            return Err(NetError::NotInitialised);
        }
        if input.is_empty() {
            return Err(NetError::MissingData("Network::forward"));
        }
        if input.len() != self.layers[0].size() {
            warn!(
                "input data length ({}) did not match input layer neurons count ({})",
                input.len(),
                self.layers[0].size()
            );
        }

        self.layers[0].set_input(input);
        for index in 1..self.layers.len() {
            let (before, rest) = self.layers.split_at_mut(index);
            rest[0].forward(before[index - 1].as_ref(), &mut self.ctx);
        }
        Ok(self.output().to_vec())
    }

    /// Accumulates the gradients for `expected` into every layer's delta weights.
    ///
    /// As with `forward`, an empty `expected` fails with `MissingData`.
    pub fn backward(&mut self, expected: &[f64]) -> Result<()> {
        if !self.is_ready() {
            return Err(NetError::NotInitialised);
        }
        if expected.is_empty() {
            return Err(NetError::MissingData("Network::backward"));
        }
        if expected.len() != self.output().len() {
            warn!(
                "expected data length ({}) did not match output layer neurons count ({})",
                expected.len(),
                self.output().len()
            );
        }

        let last = self.layers.len() - 1;
        for index in (1..=last).rev() {
            let (before, rest) = self.layers.split_at_mut(index);
            let (current, after) = rest.split_at_mut(1);
            let next = after.first().map(|l| l.as_ref());
            let target = (index == last).then_some(expected);
            current[0].backward(before[index - 1].as_ref(), next, target, &self.ctx);
        }
        Ok(())
    }

    /// Clears the accumulated gradients of every layer past the input.
    pub fn reset_delta_weights(&mut self) {
        for layer in self.layers.iter_mut().skip(1) {
            layer.reset_delta_weights();
        }
    }

    /// Applies accumulated gradients, then the max-norm constraint if enabled.
    pub fn apply_delta_weights(&mut self) {
        for layer in self.layers.iter_mut().skip(1) {
            layer.apply_delta_weights(&mut self.ctx);
        }

        if let Some(bound) = self.ctx.hp.max_norm {
            let norm = self.ctx.max_norm_total.sqrt();
            if let Some(factor) = max_norm_scale(norm, bound) {
                for layer in self.layers.iter_mut().skip(1) {
                    layer.scale_weights(factor);
                }
            }
            self.ctx.max_norm_total = 0.0;
        }
    }

    pub fn to_json(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            layers: self.layers.iter().map(|l| l.to_json()).collect(),
        }
    }

    /// Imports weights exported by `to_json`.
    ///
    /// Every layer is validated before anything is touched, so a failed
    /// import leaves the network exactly as it was.
    pub fn from_json(&mut self, data: &NetworkSnapshot) -> Result<()> {
        if data.layers.len() != self.layers.len() {
            return Err(NetError::LayerCountMismatch {
                given: data.layers.len(),
                configured: self.layers.len(),
            });
        }
        for (index, (layer, snapshot)) in self.layers.iter().zip(&data.layers).enumerate().skip(1) {
            layer.check_json(snapshot, index)?;
        }

        self.reset_delta_weights();
        for (index, (layer, snapshot)) in self.layers.iter_mut().zip(&data.layers).enumerate().skip(1) {
            layer.from_json(snapshot, index)?;
        }
        debug!("imported weights for {} layers", data.layers.len());
        Ok(())
    }

    /// Writes the weights to `path` as pretty-printed JSON.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.to_json())?;
        Ok(())
    }

    /// Reads weights previously written by `save_json` into this network.
    pub fn load_json(&mut self, path: &str) -> Result<()> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let data: NetworkSnapshot = serde_json::from_reader(reader)?;
        self.from_json(&data)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    /// Epochs run over the network's lifetime.
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Iterations run over the network's lifetime.
    pub fn iterations(&self) -> usize {
        self.ctx.iterations
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    /// `None` unless L1 regularization is enabled.
    pub fn l1_error(&self) -> Option<f64> {
        self.ctx.hp.l1.map(|_| self.ctx.l1_error)
    }

    /// `None` unless L2 regularization is enabled.
    pub fn l2_error(&self) -> Option<f64> {
        self.ctx.hp.l2.map(|_| self.ctx.l2_error)
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.ctx.hp
    }

    pub fn mini_batch_size(&self) -> usize {
        self.ctx.mini_batch_size
    }

    /// Per-epoch summaries of the most recent training run.
    pub fn epoch_stats(&self) -> &[EpochStats] {
        &self.epoch_stats
    }

    pub(crate) fn set_layer_states(&mut self, state: State) {
        for layer in &mut self.layers {
            layer.set_state(state);
        }
    }

    fn is_ready(&self) -> bool {
        matches!(self.state, State::Initialised | State::Training) && !self.layers.is_empty()
    }

    fn output(&self) -> &[f64] {
        self.layers.last().map_or(&[][..], |l| l.activations())
    }
}

/// Turns the `layers` option into layer objects: either all sizes or all layers.
fn build_layers(entries: Vec<LayerEntry>) -> Result<Vec<Box<dyn Layer>>> {
    let all_sizes = entries
        .iter()
        .all(|e| matches!(e, LayerEntry::Size(size) if *size > 0));
    let all_layers = entries.iter().all(|e| matches!(e, LayerEntry::Layer(_)));

    let layers: Vec<Box<dyn Layer>> = match (all_sizes, all_layers) {
        (true, _) | (_, true) => entries
            .into_iter()
            .map(|e| match e {
                LayerEntry::Size(size) => Box::new(FcLayer::new(size as usize)) as Box<dyn Layer>,
                LayerEntry::Layer(layer) => layer,
            })
            .collect(),
        _ => return Err(NetError::InvalidLayers),
    };

    match layers.first() {
        Some(first) if first.accepts_input() => Ok(layers),
        _ => Err(NetError::InvalidLayers),
    }
}

/// Hidden layer size used when sizing from data.
fn hidden_size(input: usize, expected: usize) -> usize {
    let (input, expected) = (input as f64, expected as f64);
    let hidden = if input / expected > 5.0 {
        expected + (input - expected).abs() / 4.0
    } else {
        input + expected
    };
    hidden.ceil() as usize
}
