use rand::Rng;

use crate::activation::Activation;
use crate::error::{NetError, Result};
use crate::init::WeightsConfig;
use crate::layers::layer::Layer;
use crate::network::checkpoint::{LayerSnapshot, UnitSnapshot, UnitWeights};
use crate::network::context::NetContext;
use crate::network::State;
use crate::optim::ParamState;

const DEFAULT_FILTER_COUNT: usize = 4;
const DEFAULT_FILTER_SIZE: usize = 3;
const DEFAULT_STRIDE: usize = 1;

/// Padding that keeps the output map the size of the input at stride 1.
fn default_padding(filter_size: usize) -> usize {
    filter_size.saturating_sub(1) / 2
}

/// Input/output map dimensions of a convolution. All maps are square.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Geometry {
    channels: usize,
    in_side: usize,
    out_side: usize,
    filter_size: usize,
    stride: usize,
    padding: usize,
}

impl Geometry {
    fn kernel_len(&self) -> usize {
        self.channels * self.filter_size * self.filter_size
    }

    fn out_len(&self) -> usize {
        self.out_side * self.out_side
    }

    fn in_len(&self) -> usize {
        self.channels * self.in_side * self.in_side
    }

    /// Flat input index under kernel cell `(ch, i, j)` when the filter sits
    /// at output `(r, c)`; `None` inside the zero padding.
    fn input_index(&self, ch: usize, r: usize, c: usize, i: usize, j: usize) -> Option<usize> {
        let y = (r * self.stride + i).checked_sub(self.padding)?;
        let x = (c * self.stride + j).checked_sub(self.padding)?;
        if y >= self.in_side || x >= self.in_side {
            return None;
        }
        Some((ch * self.in_side + y) * self.in_side + x)
    }

    fn kernel_index(&self, ch: usize, i: usize, j: usize) -> usize {
        (ch * self.filter_size + i) * self.filter_size + j
    }
}

#[derive(Debug, Clone, Default)]
struct Filter {
    weights: Vec<f64>,
    bias: f64,
    delta_weights: Vec<f64>,
    delta_bias: f64,
    weight_states: Vec<ParamState>,
    bias_state: ParamState,
    sums: Vec<f64>,
    errors: Vec<f64>,
    rrelu_slope: f64,
}

/// Convolutional layer: `size` filters slid over square input maps.
///
/// Options left unset fall back to the network's `filterCount`,
/// `filterSize`, `zeroPadding` and `stride`, then to built-in defaults.
#[derive(Debug, Default)]
pub struct ConvLayer {
    size: Option<usize>,
    filter_size: Option<usize>,
    zero_padding: Option<usize>,
    stride: Option<usize>,

    state: State,
    activation: Option<Activation>,
    weights_config: WeightsConfig,
    prev: Option<usize>,
    next: Option<usize>,

    geometry: Geometry,
    filters: Vec<Filter>,
    activations: Vec<f64>,
    input_errors: Vec<f64>,
}

impl ConvLayer {
    /// A layer of `size` filters.
    pub fn new(size: usize) -> ConvLayer {
        ConvLayer {
            size: Some(size),
            ..ConvLayer::default()
        }
    }

    pub fn filter_size(mut self, filter_size: usize) -> ConvLayer {
        self.filter_size = Some(filter_size);
        self
    }

    pub fn zero_padding(mut self, zero_padding: usize) -> ConvLayer {
        self.zero_padding = Some(zero_padding);
        self
    }

    pub fn stride(mut self, stride: usize) -> ConvLayer {
        self.stride = Some(stride);
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> ConvLayer {
        self.activation = Some(activation);
        self
    }

    /// Side of each output map; 0 before init.
    pub fn out_map_size(&self) -> usize {
        self.geometry.out_side
    }

    fn index(&self) -> usize {
        self.prev.map_or(0, |p| p + 1)
    }
}

impl Layer for ConvLayer {
    fn size(&self) -> usize {
        self.size.unwrap_or(DEFAULT_FILTER_COUNT)
    }

    fn state(&self) -> State {
        self.state
    }

    fn set_state(&mut self, state: State) {
        self.state = state;
    }

    fn activation(&self) -> Option<Activation> {
        self.activation
    }

    fn set_activation(&mut self, activation: Activation) {
        self.activation = Some(activation);
    }

    fn weights_config(&self) -> &WeightsConfig {
        &self.weights_config
    }

    fn weights_config_mut(&mut self) -> &mut WeightsConfig {
        &mut self.weights_config
    }

    fn prev(&self) -> Option<usize> {
        self.prev
    }

    fn next(&self) -> Option<usize> {
        self.next
    }

    fn assign_prev(&mut self, index: usize) {
        self.prev = Some(index);
    }

    fn assign_next(&mut self, index: usize) {
        self.next = Some(index);
    }

    fn attach(&mut self, ctx: &NetContext) {
        let conv = ctx.hp.conv;
        let size = *self.size.get_or_insert(conv.filter_count.unwrap_or(DEFAULT_FILTER_COUNT));
        let filter_size = *self
            .filter_size
            .get_or_insert(conv.filter_size.unwrap_or(DEFAULT_FILTER_SIZE));
        self.zero_padding
            .get_or_insert_with(|| conv.zero_padding.unwrap_or_else(|| default_padding(filter_size)));
        self.stride.get_or_insert(conv.stride.unwrap_or(DEFAULT_STRIDE));
        self.size = Some(size.max(1));
    }

    fn accepts_input(&self) -> bool {
        false
    }

    fn maps(&self) -> Option<(usize, usize)> {
        (self.geometry.out_side > 0).then_some((self.size(), self.geometry.out_side))
    }

    fn activations(&self) -> &[f64] {
        &self.activations
    }

    fn set_input(&mut self, input: &[f64]) {
        self.activations = input.to_vec();
    }

    fn init(&mut self, prev: &dyn Layer, ctx: &mut NetContext) -> Result<()> {
        let filter_size = self.filter_size.unwrap_or(DEFAULT_FILTER_SIZE);
        let padding = self.zero_padding.unwrap_or_else(|| default_padding(filter_size));
        let stride = self.stride.unwrap_or(DEFAULT_STRIDE).max(1);

        let (channels, in_side) = match prev.maps() {
            Some(maps) => maps,
            None => {
                let channels = ctx.hp.conv.channels.unwrap_or(1).max(1);
                let side = ((prev.size() / channels) as f64).sqrt().round() as usize;
                (channels, side)
            }
        };

        let span = (in_side + 2 * padding).checked_sub(filter_size);
        let geometry_error = NetError::InvalidConvGeometry {
            layer: self.index(),
            input: in_side,
            filter: filter_size,
            padding,
            stride,
        };
        let span = match span {
            Some(span)
                if filter_size > 0
                    && span % stride == 0
                    && channels * in_side * in_side == prev.activations().len() =>
            {
                span
            }
            _ => return Err(geometry_error),
        };

        self.geometry = Geometry {
            channels,
            in_side,
            out_side: span / stride + 1,
            filter_size,
            stride,
            padding,
        };

        let geo = self.geometry;
        let rrelu = matches!(self.activation, Some(Activation::RandomizedRelu));
        self.filters = (0..self.size())
            .map(|_| Filter {
                weights: self.weights_config.generate(geo.kernel_len(), &mut ctx.rng),
                bias: ctx.rng.gen_range(-0.1..=0.1),
                delta_weights: vec![0.0; geo.kernel_len()],
                delta_bias: 0.0,
                weight_states: vec![ParamState::default(); geo.kernel_len()],
                bias_state: ParamState::default(),
                sums: vec![0.0; geo.out_len()],
                errors: vec![0.0; geo.out_len()],
                rrelu_slope: if rrelu { ctx.rng.gen::<f64>() * 0.001 } else { 0.0 },
            })
            .collect();
        self.activations = vec![0.0; self.size() * geo.out_len()];
        self.input_errors = vec![0.0; geo.in_len()];
        Ok(())
    }

    fn forward(&mut self, prev: &dyn Layer, ctx: &mut NetContext) {
        let activation = self.activation.unwrap_or(ctx.hp.activation);
        let params = ctx.hp.activation_params;
        let geo = self.geometry;
        let input = prev.activations();
        let out_len = geo.out_len();

        for (f, filter) in self.filters.iter_mut().enumerate() {
            for r in 0..geo.out_side {
                for c in 0..geo.out_side {
                    let mut sum = filter.bias;
                    for ch in 0..geo.channels {
                        for i in 0..geo.filter_size {
                            for j in 0..geo.filter_size {
                                if let Some(k) = geo.input_index(ch, r, c, i, j) {
                                    sum += filter.weights[geo.kernel_index(ch, i, j)] * input[k];
                                }
                            }
                        }
                    }
                    let p = r * geo.out_side + c;
                    filter.sums[p] = sum;
                    self.activations[f * out_len + p] =
                        activation.function(sum, &params, filter.rrelu_slope);
                }
            }
        }
    }

    fn backward(
        &mut self,
        prev: &dyn Layer,
        next: Option<&dyn Layer>,
        expected: Option<&[f64]>,
        ctx: &NetContext,
    ) {
        let activation = self.activation.unwrap_or(ctx.hp.activation);
        let params = ctx.hp.activation_params;
        let geo = self.geometry;
        let out_len = geo.out_len();
        let signal = next.map(|l| l.input_errors()).unwrap_or(&[]);
        let input = prev.activations();
        let reg = ctx.regularization();

        self.input_errors.iter_mut().for_each(|e| *e = 0.0);

        for (f, filter) in self.filters.iter_mut().enumerate() {
            for p in 0..out_len {
                let flat = f * out_len + p;
                filter.errors[p] = match expected {
                    Some(expected) => expected.get(flat).map_or(0.0, |y| y - self.activations[flat]),
                    None => {
                        activation.derivative(filter.sums[p], &params, filter.rrelu_slope)
                            * signal.get(flat).copied().unwrap_or(0.0)
                    }
                };
            }

            let mut gradient = vec![0.0; geo.kernel_len()];
            for r in 0..geo.out_side {
                for c in 0..geo.out_side {
                    let error = filter.errors[r * geo.out_side + c];
                    if error == 0.0 {
                        continue;
                    }
                    filter.delta_bias += error;
                    for ch in 0..geo.channels {
                        for i in 0..geo.filter_size {
                            for j in 0..geo.filter_size {
                                if let Some(k) = geo.input_index(ch, r, c, i, j) {
                                    let w = geo.kernel_index(ch, i, j);
                                    gradient[w] += error * input[k];
                                    self.input_errors[k] += filter.weights[w] * error;
                                }
                            }
                        }
                    }
                }
            }

            for (dw, g) in filter.delta_weights.iter_mut().zip(gradient) {
                *dw += g * (1.0 + reg * *dw);
            }
        }
    }

    fn input_errors(&self) -> &[f64] {
        &self.input_errors
    }

    fn reset_delta_weights(&mut self) {
        for filter in &mut self.filters {
            filter.delta_weights.iter_mut().for_each(|d| *d = 0.0);
            filter.delta_bias = 0.0;
        }
    }

    fn apply_delta_weights(&mut self, ctx: &mut NetContext) {
        let optimizer = ctx.hp.optimizer;
        let lr = ctx.learning_rate();

        for filter in &mut self.filters {
            for w in 0..filter.weights.len() {
                ctx.track_regularization(filter.weights[w]);
                filter.weights[w] = optimizer.step(
                    filter.weights[w],
                    filter.delta_weights[w],
                    &mut filter.weight_states[w],
                    lr,
                    ctx.iterations,
                );
                ctx.track_norm(filter.weights[w]);
            }
            filter.bias = optimizer.step(
                filter.bias,
                filter.delta_bias,
                &mut filter.bias_state,
                lr,
                ctx.iterations,
            );
        }
    }

    fn scale_weights(&mut self, factor: f64) {
        for filter in &mut self.filters {
            filter.weights.iter_mut().for_each(|w| *w *= factor);
        }
    }

    fn to_json(&self) -> LayerSnapshot {
        let fs = self.geometry.filter_size;
        LayerSnapshot {
            weights: self
                .filters
                .iter()
                .map(|filter| UnitSnapshot {
                    bias: filter.bias,
                    weights: UnitWeights::Volume(
                        filter
                            .weights
                            .chunks(fs * fs)
                            .map(|channel| channel.chunks(fs).map(<[f64]>::to_vec).collect())
                            .collect(),
                    ),
                })
                .collect(),
        }
    }

    fn check_json(&self, snapshot: &LayerSnapshot, index: usize) -> Result<()> {
        if snapshot.weights.len() != self.filters.len() {
            return Err(NetError::WeightsMismatch {
                layer: index,
                given: snapshot.weights.len(),
                existing: self.filters.len(),
            });
        }
        let kernel = self.geometry.kernel_len();
        for unit in &snapshot.weights {
            if unit.weights.len() != kernel {
                return Err(NetError::WeightsMismatch {
                    layer: index,
                    given: unit.weights.len(),
                    existing: kernel,
                });
            }
        }
        Ok(())
    }

    fn from_json(&mut self, snapshot: &LayerSnapshot, index: usize) -> Result<()> {
        self.check_json(snapshot, index)?;
        for (filter, unit) in self.filters.iter_mut().zip(&snapshot.weights) {
            filter.bias = unit.bias;
            filter.weights = unit.weights.flatten();
        }
        Ok(())
    }
}
