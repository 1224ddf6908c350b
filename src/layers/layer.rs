use crate::activation::Activation;
use crate::error::Result;
use crate::init::WeightsConfig;
use crate::network::checkpoint::LayerSnapshot;
use crate::network::context::NetContext;
use crate::network::State;

/// What the network needs from a layer.
///
/// Layers are stored in order inside the network. Neighbours are referred to
/// by index; during a pass the network hands each layer borrowed access to
/// the neighbour it needs, so no layer ever owns or aliases another.
///
/// Activations and error signals are flat slices. A convolutional layer lays
/// them out as `[map][row][col]`.
pub trait Layer: Send {
    /// Neuron count, or filter count for convolutional layers.
    fn size(&self) -> usize;

    fn state(&self) -> State;
    fn set_state(&mut self, state: State);

    /// `None` until the network fills in its own activation.
    fn activation(&self) -> Option<Activation>;
    fn set_activation(&mut self, activation: Activation);

    fn weights_config(&self) -> &WeightsConfig;
    fn weights_config_mut(&mut self) -> &mut WeightsConfig;

    fn prev(&self) -> Option<usize>;
    fn next(&self) -> Option<usize>;
    fn assign_prev(&mut self, index: usize);
    fn assign_next(&mut self, index: usize);

    /// Called when the layer joins a network, before linking. Layers pick up
    /// network-level defaults for anything they left unset here.
    fn attach(&mut self, _ctx: &NetContext) {}

    /// Whether this layer can sit at index 0 and take raw input.
    fn accepts_input(&self) -> bool {
        true
    }

    /// `(map count, map side)` for layers producing square feature maps.
    fn maps(&self) -> Option<(usize, usize)> {
        None
    }

    /// Current output values.
    fn activations(&self) -> &[f64];

    /// Copies raw input into the activations. Only used at index 0.
    fn set_input(&mut self, input: &[f64]);

    /// Allocates and samples parameters once `prev` is linked.
    fn init(&mut self, prev: &dyn Layer, ctx: &mut NetContext) -> Result<()>;

    fn forward(&mut self, prev: &dyn Layer, ctx: &mut NetContext);

    /// `expected` is given only to the output layer; every other layer reads
    /// the error signal of `next`.
    fn backward(
        &mut self,
        prev: &dyn Layer,
        next: Option<&dyn Layer>,
        expected: Option<&[f64]>,
        ctx: &NetContext,
    );

    /// Error signal for the predecessor: one value per activation of `prev`,
    /// summed over this layer's weighted connections.
    fn input_errors(&self) -> &[f64];

    fn reset_delta_weights(&mut self);

    /// Applies accumulated deltas through the network's optimizer and feeds
    /// the regularization and max-norm accumulators.
    fn apply_delta_weights(&mut self, ctx: &mut NetContext);

    /// Multiplies every weight (not bias) by `factor`.
    fn scale_weights(&mut self, factor: f64);

    fn to_json(&self) -> LayerSnapshot;

    /// Validates a snapshot against this layer's shape without touching it.
    fn check_json(&self, snapshot: &LayerSnapshot, index: usize) -> Result<()>;

    fn from_json(&mut self, snapshot: &LayerSnapshot, index: usize) -> Result<()>;
}
