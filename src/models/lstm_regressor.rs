use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::features::{MeteoVector, NormalizedVector, FEATURE_COUNT, METEO_FEATURES};
use crate::data::window::Window;
use crate::error::{ForecastError, Result};
use crate::layers::dropout::Dropout;
use crate::layers::linear::{LinearGradients, LinearLayer};
use crate::layers::lstm_cell::{LSTMCell, LSTMCellCache, LSTMCellGradients};
use crate::models::regressor::{Predictor, SequenceRegressor};
use crate::optimizers::Optimizer;
use crate::training::{create_adam_trainer, TrainingConfig, TrainingReport};

/// Architecture of the stacked LSTM.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hidden units per recurrent layer, bottom to top.
    pub hidden_sizes: Vec<usize>,
    /// Dropout on the sequence output of every recurrent layer except the top one.
    pub dropout: f64,
    /// Seed for weight initialisation.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            hidden_sizes: vec![64, 32],
            dropout: 0.2,
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_sizes.is_empty() || self.hidden_sizes.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "hidden_sizes must list at least one positive layer size".into(),
            ));
        }
        Dropout::new(self.dropout).map(|_| ())
    }
}

/// Per-layer values kept for backpropagation through time.
#[derive(Clone, Debug)]
pub struct LayerCache {
    pub steps: Vec<LSTMCellCache>,
    pub dropout_masks: Vec<Option<Array2<f64>>>,
}

/// Everything the backward pass needs from one forward pass.
#[derive(Clone, Debug)]
pub struct ForwardCache {
    pub layers: Vec<LayerCache>,
    pub head_input: Array2<f64>,
}

/// Gradients for the whole stack.
#[derive(Clone, Debug)]
pub struct RegressorGradients {
    pub layers: Vec<LSTMCellGradients>,
    pub head: LinearGradients,
}

impl RegressorGradients {
    /// Clip each gradient matrix to `max_norm` (Frobenius).
    pub fn clip(&mut self, max_norm: f64) {
        let layers = self.layers.iter_mut().flat_map(|g| g.matrices_mut());
        for matrix in layers.chain(self.head.matrices_mut()) {
            let norm = matrix.mapv(|x| x * x).sum().sqrt();
            if norm > max_norm {
                *matrix *= max_norm / norm;
            }
        }
    }
}

fn check_shape(got: (usize, usize), expected: (usize, usize)) -> Result<()> {
    if got == expected {
        return Ok(());
    }
    let (expected, got) = if got.0 != expected.0 { (expected.0, got.0) } else { (expected.1, got.1) };
    Err(ForecastError::DimensionMismatch { expected, got })
}

/// Stacked LSTM with a dense head: `(L, 8)` normalized days in, 6 normalized values out.
///
/// Only the final timestep of the top layer feeds the head.
#[derive(Clone, Debug)]
pub struct LstmRegressor {
    layers: Vec<LSTMCell>,
    head: LinearLayer,
    dropout: Dropout,
    sequence_length: usize,
}

impl LstmRegressor {
    pub fn new(sequence_length: usize, config: &ModelConfig) -> Result<Self> {
        config.validate()?;
        if sequence_length == 0 {
            return Err(ForecastError::InvalidParameter("sequence length must be positive".into()));
        }
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut layers = Vec::with_capacity(config.hidden_sizes.len());
        let mut input_size = FEATURE_COUNT;
        for &hidden_size in &config.hidden_sizes {
            layers.push(LSTMCell::new(input_size, hidden_size, &mut rng));
            input_size = hidden_size;
        }
        let head = LinearLayer::new(input_size, METEO_FEATURES, &mut rng);

        Ok(LstmRegressor {
            layers,
            head,
            dropout: Dropout::new(config.dropout)?,
            sequence_length,
        })
    }

    /// Reassembles a regressor from stored parameters, checking the layer chain.
    pub fn from_parts(layers: Vec<LSTMCell>, head: LinearLayer, dropout: Dropout, sequence_length: usize) -> Result<Self> {
        if sequence_length == 0 {
            return Err(ForecastError::InvalidParameter("sequence length must be positive".into()));
        }
        if layers.is_empty() {
            return Err(ForecastError::InvalidParameter("regressor needs at least one LSTM layer".into()));
        }
        Dropout::new(dropout.dropout_rate)?;

        let mut expected_input = FEATURE_COUNT;
        for cell in &layers {
            if cell.input_size != expected_input {
                return Err(ForecastError::DimensionMismatch {
                    expected: expected_input,
                    got: cell.input_size,
                });
            }
            let gates = 4 * cell.hidden_size;
            check_shape(cell.w_ih.dim(), (gates, cell.input_size))?;
            check_shape(cell.w_hh.dim(), (gates, cell.hidden_size))?;
            check_shape(cell.bias.dim(), (gates, 1))?;
            expected_input = cell.hidden_size;
        }

        if head.input_size != expected_input {
            return Err(ForecastError::DimensionMismatch {
                expected: expected_input,
                got: head.input_size,
            });
        }
        check_shape(head.weight.dim(), (METEO_FEATURES, expected_input))?;
        check_shape(head.bias.dim(), (METEO_FEATURES, 1))?;
        Ok(LstmRegressor { layers, head, dropout, sequence_length })
    }

    pub fn layers(&self) -> &[LSTMCell] {
        &self.layers
    }

    pub fn head(&self) -> &LinearLayer {
        &self.head
    }

    pub fn dropout(&self) -> Dropout {
        self.dropout
    }

    pub fn hidden_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(|cell| cell.hidden_size).collect()
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(LSTMCell::num_parameters).sum::<usize>() + self.head.num_parameters()
    }

    fn run<R: Rng + ?Sized>(&self, inputs: &[Array2<f64>], mut rng: Option<&mut R>) -> (Array2<f64>, ForwardCache) {
        let batch = inputs.first().map_or(1, |x| x.ncols());
        let mut sequence: Vec<Array2<f64>> = inputs.to_vec();
        let mut layer_caches = Vec::with_capacity(self.layers.len());

        for (index, cell) in self.layers.iter().enumerate() {
            let is_top = index + 1 == self.layers.len();
            let mut hx = cell.zero_state(batch);
            let mut cx = cell.zero_state(batch);
            let mut outputs = Vec::with_capacity(sequence.len());
            let mut steps = Vec::with_capacity(sequence.len());
            let mut dropout_masks = Vec::with_capacity(sequence.len());

            for input in &sequence {
                let (hy, cy, cache) = cell.forward(input, &hx, &cx);
                steps.push(cache);

                let mask = match rng.as_deref_mut() {
                    Some(rng) if !is_top => self.dropout.sample_mask(hy.dim(), rng),
                    _ => None,
                };
                outputs.push(Dropout::apply(mask.as_ref(), hy.clone()));
                dropout_masks.push(mask);

                hx = hy;
                cx = cy;
            }

            layer_caches.push(LayerCache { steps, dropout_masks });
            sequence = outputs;
        }

        let head_input = sequence
            .pop()
            .unwrap_or_else(|| Array2::zeros((self.head.input_size, batch)));
        let output = self.head.forward(&head_input);
        (output, ForwardCache { layers: layer_caches, head_input })
    }

    /// Inference pass over a batch of `(FEATURE_COUNT, batch)` timesteps. No dropout.
    pub fn forward_batch(&self, inputs: &[Array2<f64>]) -> Array2<f64> {
        self.run::<StdRng>(inputs, None).0
    }

    /// Training pass with dropout masks drawn from `rng`.
    pub fn forward_train<R: Rng + ?Sized>(&self, inputs: &[Array2<f64>], rng: &mut R) -> (Array2<f64>, ForwardCache) {
        self.run(inputs, Some(rng))
    }

    /// Backpropagation through time across every layer.
    pub fn backward(&self, cache: &ForwardCache, d_output: &Array2<f64>) -> RegressorGradients {
        let (head_gradients, d_head_input) = self.head.backward(&cache.head_input, d_output);
        let batch = d_output.ncols();

        // gradient w.r.t. each timestep output of the layer being processed
        let top_size = self.head.input_size;
        let steps = cache.layers.first().map_or(0, |layer| layer.steps.len());
        let mut d_sequence: Vec<Array2<f64>> = vec![Array2::zeros((top_size, batch)); steps];
        if let Some(last) = d_sequence.last_mut() {
            *last = d_head_input;
        }

        let mut layer_gradients = Vec::with_capacity(self.layers.len());
        for (cell, layer_cache) in self.layers.iter().zip(&cache.layers).rev() {
            let mut gradients = cell.zero_gradients();
            let mut dh_next = cell.zero_state(batch);
            let mut dc_next = cell.zero_state(batch);
            let mut d_inputs = vec![Array2::zeros((cell.input_size, batch)); steps];

            for t in (0..steps).rev() {
                let d_out = Dropout::apply(layer_cache.dropout_masks[t].as_ref(), d_sequence[t].clone());
                let dh = d_out + &dh_next;
                let (step_gradients, dx, dhx, dcx) = cell.backward(&dh, &dc_next, &layer_cache.steps[t]);
                gradients.accumulate(&step_gradients);
                d_inputs[t] = dx;
                dh_next = dhx;
                dc_next = dcx;
            }

            layer_gradients.push(gradients);
            d_sequence = d_inputs;
        }
        layer_gradients.reverse();

        RegressorGradients { layers: layer_gradients, head: head_gradients }
    }

    /// Update parameters for all layers using computed gradients
    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &RegressorGradients, optimizer: &mut O) {
        for (i, (cell, cell_gradients)) in self.layers.iter_mut().zip(&gradients.layers).enumerate() {
            cell.update_parameters(cell_gradients, optimizer, &format!("layer_{}", i));
        }
        self.head.update_parameters(&gradients.head, optimizer, "head");
    }
}

impl Predictor for LstmRegressor {
    fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    fn predict(&self, window: &[NormalizedVector]) -> Result<MeteoVector> {
        if window.len() != self.sequence_length {
            return Err(ForecastError::DimensionMismatch {
                expected: self.sequence_length,
                got: window.len(),
            });
        }
        let inputs: Vec<Array2<f64>> = window
            .iter()
            .map(|day| Array2::from_shape_fn((FEATURE_COUNT, 1), |(f, _)| day.0[f]))
            .collect();
        let output = self.forward_batch(&inputs);

        let mut prediction = [0.0; METEO_FEATURES];
        for (slot, value) in prediction.iter_mut().zip(output.column(0)) {
            *slot = *value;
        }
        Ok(prediction)
    }
}

impl SequenceRegressor for LstmRegressor {
    fn fit(&mut self, train: &[Window], validation: &[Window], config: &TrainingConfig) -> Result<TrainingReport> {
        create_adam_trainer(self, config.clone()).train(train, validation)
    }
}
