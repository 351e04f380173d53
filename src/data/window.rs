use log::info;
use ndarray::Array2;

use crate::data::features::{MeteoVector, NormalizedVector, FEATURE_COUNT, METEO_FEATURES};
use crate::error::{ForecastError, Result};

/// Default number of days in one model input.
pub const DEFAULT_SEQUENCE_LENGTH: usize = 30;

/// `L` consecutive normalized days paired with the meteorological values of day `L + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub inputs: Vec<NormalizedVector>,
    pub target: MeteoVector,
}

/// All training windows plus the unpaired trailing seed window.
#[derive(Debug, Clone)]
pub struct WindowSet {
    pub windows: Vec<Window>,
    pub seed: Vec<NormalizedVector>,
}

/// Slices a normalized series into fixed-length windows.
#[derive(Debug, Clone, Copy)]
pub struct WindowBuilder {
    pub sequence_length: usize,
}

impl Default for WindowBuilder {
    fn default() -> Self {
        WindowBuilder { sequence_length: DEFAULT_SEQUENCE_LENGTH }
    }
}

impl WindowBuilder {
    pub fn new(sequence_length: usize) -> Self {
        WindowBuilder { sequence_length }
    }

    /// Emits `N - L` windows and the last `L` vectors as the seed.
    pub fn build(&self, vectors: &[NormalizedVector]) -> Result<WindowSet> {
        let l = self.sequence_length;
        if l == 0 {
            return Err(ForecastError::InvalidParameter("sequence length must be positive".into()));
        }
        let n = vectors.len();
        if n <= l {
            return Err(ForecastError::InsufficientHistory { needed: l + 1, got: n });
        }

        let windows: Vec<Window> = (l..n)
            .map(|i| Window {
                inputs: vectors[i - l..i].to_vec(),
                target: vectors[i].meteo(),
            })
            .collect();
        let seed = vectors[n - l..].to_vec();

        info!("Built {} windows of length {} from {} vectors", windows.len(), l, n);
        Ok(WindowSet { windows, seed })
    }
}

/// Packs a batch of windows as one `(FEATURE_COUNT, batch)` matrix per timestep.
pub fn batch_inputs(windows: &[&Window]) -> Vec<Array2<f64>> {
    let steps = windows.first().map_or(0, |w| w.inputs.len());
    (0..steps)
        .map(|t| {
            Array2::from_shape_fn((FEATURE_COUNT, windows.len()), |(f, b)| windows[b].inputs[t].0[f])
        })
        .collect()
}

/// Packs the targets of a batch as a `(METEO_FEATURES, batch)` matrix.
pub fn batch_targets(windows: &[&Window]) -> Array2<f64> {
    Array2::from_shape_fn((METEO_FEATURES, windows.len()), |(f, b)| windows[b].target[f])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> Vec<NormalizedVector> {
        (0..n).map(|i| NormalizedVector([i as f64; FEATURE_COUNT])).collect()
    }

    #[test]
    fn test_window_count() {
        for (n, l) in [(31, 30), (100, 30), (10, 1), (50, 7)] {
            let set = WindowBuilder::new(l).build(&series(n)).unwrap();
            assert_eq!(set.windows.len(), n - l);
            assert_eq!(set.seed.len(), l);
            assert!(set.windows.iter().all(|w| w.inputs.len() == l));
        }
    }

    #[test]
    fn test_insufficient_history() {
        for n in [0, 5, 30] {
            let err = WindowBuilder::new(30).build(&series(n)).unwrap_err();
            assert!(matches!(err, ForecastError::InsufficientHistory { needed: 31, got } if got == n));
        }
    }

    #[test]
    fn test_window_alignment_and_seed() {
        let set = WindowBuilder::new(3).build(&series(6)).unwrap();
        let first = &set.windows[0];
        assert_eq!(first.inputs[0].0[0], 0.0);
        assert_eq!(first.inputs[2].0[0], 2.0);
        assert_eq!(first.target, [3.0; METEO_FEATURES]);
        let last = set.windows.last().unwrap();
        assert_eq!(last.target, [5.0; METEO_FEATURES]);
        let seed: Vec<f64> = set.seed.iter().map(|v| v.0[0]).collect();
        assert_eq!(seed, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_batch_packing() {
        let set = WindowBuilder::new(2).build(&series(5)).unwrap();
        let refs: Vec<&Window> = set.windows.iter().collect();
        let inputs = batch_inputs(&refs);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].shape(), &[FEATURE_COUNT, 3]);
        assert_eq!(inputs[1][[0, 2]], 3.0);
        let targets = batch_targets(&refs);
        assert_eq!(targets.shape(), &[METEO_FEATURES, 3]);
        assert_eq!(targets[[5, 0]], 2.0);
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(WindowBuilder::new(0).build(&series(4)).is_err());
    }
}
