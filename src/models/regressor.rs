use log::info;

use crate::data::features::{MeteoVector, NormalizedVector, FEATURE_COUNT, METEO_FEATURES};
use crate::data::window::Window;
use crate::error::{ForecastError, Result};
use crate::training::{chronological_split, TrainingConfig, TrainingReport};

/// Read-only access to a next-day prediction.
pub trait Predictor {
    /// Number of normalized days one prediction consumes.
    fn sequence_length(&self) -> usize;

    /// Predicts the next day's normalized meteorological values from `window`.
    fn predict(&self, window: &[NormalizedVector]) -> Result<MeteoVector>;
}

/// Any trainable model with input shape `(L, 8)` and output shape `(6,)`.
pub trait SequenceRegressor: Predictor {
    /// `(sequence_length, FEATURE_COUNT)`.
    fn input_shape(&self) -> (usize, usize) {
        (self.sequence_length(), FEATURE_COUNT)
    }

    fn output_size(&self) -> usize {
        METEO_FEATURES
    }

    /// Fits on `train`, monitoring `validation` for early stopping.
    fn fit(&mut self, train: &[Window], validation: &[Window], config: &TrainingConfig) -> Result<TrainingReport>;
}

/// A regressor frozen after training. Only prediction is exposed.
#[derive(Debug, Clone)]
pub struct TrainedModel<R> {
    regressor: R,
    report: TrainingReport,
}

impl<R: Predictor> TrainedModel<R> {
    pub(crate) fn from_parts(regressor: R, report: TrainingReport) -> Self {
        TrainedModel { regressor, report }
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    pub fn regressor(&self) -> &R {
        &self.regressor
    }
}

impl<R: Predictor> Predictor for TrainedModel<R> {
    fn sequence_length(&self) -> usize {
        self.regressor.sequence_length()
    }

    fn predict(&self, window: &[NormalizedVector]) -> Result<MeteoVector> {
        self.regressor.predict(window)
    }
}

/// Splits `windows` chronologically and fits `regressor` on them.
///
/// Fails with `InsufficientData` when either side of the split would be empty.
pub fn train<R: SequenceRegressor>(mut regressor: R, windows: &[Window], config: &TrainingConfig) -> Result<TrainedModel<R>> {
    config.validate()?;
    if let Some(first) = windows.first() {
        if first.inputs.len() != regressor.sequence_length() {
            return Err(ForecastError::DimensionMismatch {
                expected: regressor.sequence_length(),
                got: first.inputs.len(),
            });
        }
    }
    let (train_windows, validation_windows) = chronological_split(windows, config.validation_fraction)?;
    info!(
        "Chronological split: {} training windows, {} validation windows",
        train_windows.len(),
        validation_windows.len()
    );

    let report = regressor.fit(train_windows, validation_windows, config)?;
    Ok(TrainedModel::from_parts(regressor, report))
}
