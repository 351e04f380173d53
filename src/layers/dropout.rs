use ndarray::Array2;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Inverted dropout applied to the sequence output of a recurrent layer.
///
/// Masks are drawn per element and per timestep and already carry the
/// `1 / keep_prob` scale, so the backward pass is a plain multiply.
/// Inference never drops anything.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dropout {
    pub dropout_rate: f64,
}

impl Dropout {
    pub fn new(dropout_rate: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&dropout_rate) {
            return Err(ForecastError::InvalidParameter(format!(
                "dropout rate must be in [0, 1), got {}",
                dropout_rate
            )));
        }
        Ok(Dropout { dropout_rate })
    }

    pub fn is_active(&self) -> bool {
        self.dropout_rate > 0.0
    }

    /// Draws a scaled keep-mask, or `None` when the rate is zero.
    pub fn sample_mask<R: Rng + ?Sized>(&self, shape: (usize, usize), rng: &mut R) -> Option<Array2<f64>> {
        if !self.is_active() {
            return None;
        }
        let keep_prob = 1.0 - self.dropout_rate;
        let keep = Bernoulli::new(keep_prob).ok()?;
        let scale = 1.0 / keep_prob;
        Some(Array2::from_shape_simple_fn(shape, || if keep.sample(rng) { scale } else { 0.0 }))
    }

    /// Applies a mask drawn by [`Dropout::sample_mask`]. Used for both directions.
    pub fn apply(mask: Option<&Array2<f64>>, values: Array2<f64>) -> Array2<f64> {
        match mask {
            Some(mask) => values * mask,
            None => values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rate_validation() {
        assert!(Dropout::new(0.2).is_ok());
        assert!(Dropout::new(1.0).is_err());
        assert!(Dropout::new(-0.1).is_err());
    }

    #[test]
    fn test_mask_values_are_scaled() {
        let mut rng = StdRng::seed_from_u64(11);
        let dropout = Dropout::new(0.5).unwrap();
        let mask = dropout.sample_mask((20, 20), &mut rng).unwrap();
        assert!(mask.iter().all(|&m| m == 0.0 || m == 2.0));
        let kept = mask.iter().filter(|&&m| m > 0.0).count();
        assert!(kept > 100 && kept < 300);
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let mut rng = StdRng::seed_from_u64(11);
        let dropout = Dropout::new(0.0).unwrap();
        let mask = dropout.sample_mask((2, 2), &mut rng);
        assert!(mask.is_none());
        let input = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(Dropout::apply(mask.as_ref(), input.clone()), input);
    }
}
