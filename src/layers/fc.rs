use rand::Rng;

use crate::activation::Activation;
use crate::error::{NetError, Result};
use crate::init::WeightsConfig;
use crate::layers::layer::Layer;
use crate::math::Matrix;
use crate::network::checkpoint::{LayerSnapshot, UnitSnapshot, UnitWeights};
use crate::network::context::NetContext;
use crate::network::State;
use crate::optim::ParamState;

/// Fully-connected layer.
///
/// Row `n` of `weights` holds neuron `n`'s incoming weights, one per
/// activation of the previous layer. The input layer keeps no parameters.
#[derive(Debug)]
pub struct FcLayer {
    pub size: usize,
    state: State,
    activation: Option<Activation>,
    weights_config: WeightsConfig,
    prev: Option<usize>,
    next: Option<usize>,

    pub weights: Matrix,
    pub biases: Vec<f64>,
    delta_weights: Matrix,
    delta_biases: Vec<f64>,
    weight_states: Vec<Vec<ParamState>>,
    bias_states: Vec<ParamState>,

    sums: Vec<f64>, // pre-activation values, needed for the derivative
    activations: Vec<f64>,
    errors: Vec<f64>,
    dropped: Vec<bool>,
    rrelu_slopes: Vec<f64>,
    input_errors: Vec<f64>,
}

impl FcLayer {
    pub fn new(size: usize) -> FcLayer {
        FcLayer {
            size,
            state: State::NotDefined,
            activation: None,
            weights_config: WeightsConfig::default(),
            prev: None,
            next: None,
            weights: Matrix::default(),
            biases: vec![],
            delta_weights: Matrix::default(),
            delta_biases: vec![],
            weight_states: vec![],
            bias_states: vec![],
            sums: vec![0.0; size],
            activations: vec![0.0; size],
            errors: vec![0.0; size],
            dropped: vec![false; size],
            rrelu_slopes: vec![0.0; size],
            input_errors: vec![],
        }
    }

    /// Uses `activation` instead of the network-wide one.
    pub fn with_activation(mut self, activation: Activation) -> FcLayer {
        self.activation = Some(activation);
        self
    }

    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    fn is_input(&self) -> bool {
        self.prev.is_none()
    }
}

impl Layer for FcLayer {
    fn size(&self) -> usize {
        self.size
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

    fn activations(&self) -> &[f64] {
        &self.activations
    }

    fn set_input(&mut self, input: &[f64]) {
        for (a, x) in self.activations.iter_mut().zip(input) {
            *a = *x;
        }
    }

    fn init(&mut self, prev: &dyn Layer, ctx: &mut NetContext) -> Result<()> {
        let inputs = prev.activations().len();
        let rows = (0..self.size)
            .map(|_| self.weights_config.generate(inputs, &mut ctx.rng))
            .collect();

        self.weights = Matrix::from_data(rows);
        self.biases = (0..self.size).map(|_| ctx.rng.gen_range(-0.1..=0.1)).collect();
        self.delta_weights = Matrix::zeros(self.size, inputs);
        self.delta_biases = vec![0.0; self.size];
        self.weight_states = vec![vec![ParamState::default(); inputs]; self.size];
        self.bias_states = vec![ParamState::default(); self.size];
        self.input_errors = vec![0.0; inputs];

        if matches!(self.activation, Some(Activation::RandomizedRelu)) {
            self.rrelu_slopes = (0..self.size).map(|_| ctx.rng.gen::<f64>() * 0.001).collect();
        }
        Ok(())
    }

    fn forward(&mut self, prev: &dyn Layer, ctx: &mut NetContext) {
        let activation = self.activation.unwrap_or(ctx.hp.activation);
        let params = ctx.hp.activation_params;
        let keep = ctx.hp.dropout;
        let dropping = self.state == State::Training && keep < 1.0;
        let weighted = self.weights.mul_vec(prev.activations());

        for n in 0..self.size {
            self.dropped[n] = dropping && ctx.rng.gen::<f64>() > keep;
            if self.dropped[n] {
                self.activations[n] = 0.0;
                continue;
            }

            let sum = self.biases[n] + weighted[n];
            self.sums[n] = sum;

            let a = activation.function(sum, &params, self.rrelu_slopes[n]);
            self.activations[n] = if dropping { a / keep } else { a };
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
        let signal = next.map(|l| l.input_errors()).unwrap_or(&[]);

        for n in 0..self.size {
            self.errors[n] = if self.dropped[n] {
                0.0
            } else if let Some(expected) = expected {
                expected.get(n).map_or(0.0, |y| y - self.activations[n])
            } else {
                activation.derivative(self.sums[n], &params, self.rrelu_slopes[n])
                    * signal.get(n).copied().unwrap_or(0.0)
            };
        }

        let reg = ctx.regularization();
        let input = prev.activations();
        for n in 0..self.size {
            let error = self.errors[n];
            for (dw, x) in self.delta_weights.row_mut(n).iter_mut().zip(input) {
                *dw += error * x * (1.0 + reg * *dw);
            }
            self.delta_biases[n] += error;
        }

        self.input_errors = self.weights.transpose_mul_vec(&self.errors);
    }

    fn input_errors(&self) -> &[f64] {
        &self.input_errors
    }

    fn reset_delta_weights(&mut self) {
        self.delta_weights.fill(0.0);
        self.delta_biases.iter_mut().for_each(|b| *b = 0.0);
    }

    fn apply_delta_weights(&mut self, ctx: &mut NetContext) {
        let optimizer = ctx.hp.optimizer;
        let lr = ctx.learning_rate();

        for n in 0..self.weights.rows {
            for j in 0..self.weights.cols {
                let w = self.weights.data[n][j];
                ctx.track_regularization(w);
                let updated = optimizer.step(
                    w,
                    self.delta_weights.data[n][j],
                    &mut self.weight_states[n][j],
                    lr,
                    ctx.iterations,
                );
                self.weights.data[n][j] = updated;
                ctx.track_norm(updated);
            }
            self.biases[n] = optimizer.step(
                self.biases[n],
                self.delta_biases[n],
                &mut self.bias_states[n],
                lr,
                ctx.iterations,
            );
        }
    }

    fn scale_weights(&mut self, factor: f64) {
        self.weights.map_in_place(|w| w * factor);
    }

    fn to_json(&self) -> LayerSnapshot {
        if self.is_input() {
            return LayerSnapshot::default();
        }
        LayerSnapshot {
            weights: self
                .biases
                .iter()
                .zip(&self.weights.data)
                .map(|(bias, row)| UnitSnapshot {
                    bias: *bias,
                    weights: UnitWeights::Flat(row.clone()),
                })
                .collect(),
        }
    }

    fn check_json(&self, snapshot: &LayerSnapshot, index: usize) -> Result<()> {
        if self.is_input() {
            return Ok(());
        }
        if snapshot.weights.len() != self.size {
            return Err(NetError::WeightsMismatch {
                layer: index,
                given: snapshot.weights.len(),
                existing: self.size,
            });
        }
        for unit in &snapshot.weights {
            if unit.weights.len() != self.weights.cols {
                return Err(NetError::WeightsMismatch {
                    layer: index,
                    given: unit.weights.len(),
                    existing: self.weights.cols,
                });
            }
        }
        Ok(())
    }

    fn from_json(&mut self, snapshot: &LayerSnapshot, index: usize) -> Result<()> {
        self.check_json(snapshot, index)?;
        if self.is_input() {
            return Ok(());
        }
        for (n, unit) in snapshot.weights.iter().enumerate() {
            self.biases[n] = unit.bias;
            self.weights.data[n] = unit.weights.flatten();
        }
        Ok(())
    }
}
