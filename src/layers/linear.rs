use ndarray::{Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::optimizers::Optimizer;
use crate::utils::glorot_limit;

/// Holds gradients for linear layer parameters during backpropagation
#[derive(Clone, Debug)]
pub struct LinearGradients {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

impl LinearGradients {
    pub fn matrices_mut(&mut self) -> [&mut Array2<f64>; 2] {
        [&mut self.weight, &mut self.bias]
    }
}

/// Dense output head: `output = weight · input + bias`
///
/// `weight` is `(output_size, input_size)`, `bias` is `(output_size, 1)` and
/// broadcasts over the batch columns.
#[derive(Clone, Debug)]
pub struct LinearLayer {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
    pub input_size: usize,
    pub output_size: usize,
}

impl LinearLayer {
    /// Glorot-uniform weights and zero bias.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let limit = glorot_limit(input_size, output_size);
        let weight = Array2::random_using((output_size, input_size), Uniform::new_inclusive(-limit, limit), rng);
        let bias = Array2::zeros((output_size, 1));

        Self { weight, bias, input_size, output_size }
    }

    /// Create a new linear layer with custom initialization
    pub fn from_weights(weight: Array2<f64>, bias: Array2<f64>) -> Self {
        let (output_size, input_size) = weight.dim();
        Self { weight, bias, input_size, output_size }
    }

    /// `(input_size, batch)` in, `(output_size, batch)` out.
    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        self.weight.dot(input) + &self.bias
    }

    /// Returns parameter gradients and the gradient w.r.t. `input`.
    pub fn backward(&self, input: &Array2<f64>, grad_output: &Array2<f64>) -> (LinearGradients, Array2<f64>) {
        let gradients = LinearGradients {
            weight: grad_output.dot(&input.t()),
            bias: grad_output.sum_axis(Axis(1)).insert_axis(Axis(1)),
        };
        let input_grad = self.weight.t().dot(grad_output);
        (gradients, input_grad)
    }

    /// Update parameters using the provided optimizer
    pub fn update_parameters<O: Optimizer>(&mut self, gradients: &LinearGradients, optimizer: &mut O, prefix: &str) {
        optimizer.update(&format!("{}_weight", prefix), &mut self.weight, &gradients.weight);
        optimizer.update(&format!("{}_bias", prefix), &mut self.bias, &gradients.bias);
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizers::Adam;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_layer_creation() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = LinearLayer::new(10, 5, &mut rng);
        assert_eq!(layer.weight.shape(), &[5, 10]);
        assert_eq!(layer.bias.shape(), &[5, 1]);
        assert_eq!(layer.num_parameters(), 55);
    }

    #[test]
    fn test_forward_broadcasts_bias() {
        let layer = LinearLayer::from_weights(arr2(&[[1.0, 2.0], [3.0, 4.0]]), arr2(&[[0.5], [-0.5]]));
        let output = layer.forward(&arr2(&[[1.0, 0.0], [1.0, 2.0]]));
        assert_eq!(output, arr2(&[[3.5, 4.5], [6.5, 7.5]]));
    }

    #[test]
    fn test_backward_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = LinearLayer::new(3, 2, &mut rng);
        let input = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let grad_output = arr2(&[[1.0, 1.0], [1.0, 1.0]]);

        let (gradients, input_grad) = layer.backward(&input, &grad_output);

        assert_eq!(gradients.weight.shape(), &[2, 3]);
        assert_eq!(gradients.bias, arr2(&[[2.0], [2.0]]));
        assert_eq!(input_grad.shape(), &[3, 2]);
    }

    #[test]
    fn test_optimizer_step_reduces_error() {
        let mut layer = LinearLayer::from_weights(arr2(&[[0.0, 0.0]]), arr2(&[[0.0]]));
        let mut optimizer = Adam::new(0.05);
        let input = arr2(&[[1.0], [2.0]]);
        let target = arr2(&[[3.0]]);

        let before = (&layer.forward(&input) - &target)[[0, 0]].abs();
        let grad_output = &layer.forward(&input) - &target;
        let (gradients, _) = layer.backward(&input, &grad_output);
        layer.update_parameters(&gradients, &mut optimizer, "head");
        let after = (&layer.forward(&input) - &target)[[0, 0]].abs();

        assert!(after < before);
    }
}
