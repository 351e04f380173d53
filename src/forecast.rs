//! Autoregressive rollout from the seed window.
//!
//! The forecaster moves through `Seeded -> Rolling -> Done`. Each step asks the
//! predictor for the next day's six meteorological channels, computes that
//! day's cyclical channels from the calendar, and slides the window forward.
//! The window is rebuilt on every step, so a snapshot taken between steps is
//! never mutated afterwards.

use chrono::{Duration, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::data::features::{cyclical_features, Feature, MeteoVector, NormalizedVector};
use crate::data::scaler::FeatureBounds;
use crate::error::{ForecastError, Result};
use crate::models::regressor::Predictor;

/// One year of daily steps.
pub const DEFAULT_HORIZON: usize = 365;

/// A predicted normalized meteorological vector for one future date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    pub date: NaiveDate,
    pub values: MeteoVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastState {
    Seeded,
    Rolling { completed: usize },
    Done,
}

/// Normalized cyclical channels for `date` under `bounds`.
pub fn normalized_cyclical(date: NaiveDate, bounds: &FeatureBounds) -> (f64, f64) {
    let (sin_doy, cos_doy) = cyclical_features(date);
    (
        bounds.normalize_value(Feature::SinDoy, sin_doy),
        bounds.normalize_value(Feature::CosDoy, cos_doy),
    )
}

pub struct Forecaster<'a, P: Predictor> {
    predictor: &'a P,
    bounds: &'a FeatureBounds,
    window: Vec<NormalizedVector>,
    start_date: NaiveDate,
    horizon: usize,
    steps: Vec<ForecastStep>,
    state: ForecastState,
}

impl<'a, P: Predictor> Forecaster<'a, P> {
    /// Seeds the rollout. The first forecast date is `start_date`.
    pub fn new(
        predictor: &'a P,
        bounds: &'a FeatureBounds,
        seed: &[NormalizedVector],
        start_date: NaiveDate,
        horizon: usize,
    ) -> Result<Self> {
        let length = predictor.sequence_length();
        if seed.len() != length {
            return Err(ForecastError::DimensionMismatch { expected: length, got: seed.len() });
        }
        Ok(Forecaster {
            predictor,
            bounds,
            window: seed.to_vec(),
            start_date,
            horizon,
            steps: Vec::with_capacity(horizon),
            state: ForecastState::Seeded,
        })
    }

    pub fn state(&self) -> ForecastState {
        self.state
    }

    /// Current input window; always exactly `sequence_length` days.
    pub fn window(&self) -> &[NormalizedVector] {
        &self.window
    }

    pub fn steps(&self) -> &[ForecastStep] {
        &self.steps
    }

    /// Date the next step will predict.
    pub fn next_date(&self) -> NaiveDate {
        self.start_date + Duration::days(self.steps.len() as i64)
    }

    /// Performs one rolling transition. Returns `None` once the horizon is reached.
    pub fn step(&mut self) -> Result<Option<ForecastStep>> {
        if self.steps.len() >= self.horizon {
            self.state = ForecastState::Done;
            return Ok(None);
        }

        let index = self.steps.len();
        let date = self.next_date();
        let values = self
            .predictor
            .predict(&self.window)
            .map_err(|e| ForecastError::ForecastAborted { step: index, reason: e.to_string() })?;
        if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::ForecastAborted {
                step: index,
                reason: format!("non-finite prediction for {}", Feature::METEO[bad].name()),
            });
        }

        let (sin_doy, cos_doy) = normalized_cyclical(date, self.bounds);
        let next = NormalizedVector::from_parts(values, sin_doy, cos_doy);

        let mut window = Vec::with_capacity(self.window.len());
        window.extend_from_slice(&self.window[1..]);
        window.push(next);
        self.window = window;

        let step = ForecastStep { date, values };
        self.steps.push(step);
        self.state = if self.steps.len() == self.horizon {
            ForecastState::Done
        } else {
            ForecastState::Rolling { completed: self.steps.len() }
        };
        debug!("Forecast step {} for {}", index, date);
        Ok(Some(step))
    }

    /// Rolls until done. Any failed step discards the whole horizon.
    pub fn run(mut self) -> Result<Vec<ForecastStep>> {
        info!("Rolling out {} days starting {}", self.horizon, self.start_date);
        while self.step()?.is_some() {}
        info!("Rollout finished with {} steps", self.steps.len());
        Ok(self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::features::{EncodedVector, FEATURE_COUNT};
    use std::cell::Cell;

    /// Predicts the last day's values plus a small drift.
    struct Drift {
        length: usize,
        calls: Cell<usize>,
        fail_at: Option<usize>,
    }

    impl Predictor for Drift {
        fn sequence_length(&self) -> usize {
            self.length
        }

        fn predict(&self, window: &[NormalizedVector]) -> Result<MeteoVector> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            if Some(call) == self.fail_at {
                return Err(ForecastError::InvalidParameter("boom".into()));
            }
            let mut next = window[window.len() - 1].meteo();
            for v in next.iter_mut() {
                *v += 0.01;
            }
            Ok(next)
        }
    }

    fn bounds() -> FeatureBounds {
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        FeatureBounds::fit(&[
            EncodedVector { date: day, values: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0, -1.0] },
            EncodedVector { date: day, values: [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0] },
        ])
        .unwrap()
    }

    fn seed(length: usize) -> Vec<NormalizedVector> {
        (0..length).map(|i| NormalizedVector([i as f64 / 100.0; FEATURE_COUNT])).collect()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_rollout_length_and_dates() {
        let model = Drift { length: 30, calls: Cell::new(0), fail_at: None };
        let bounds = bounds();
        let steps = Forecaster::new(&model, &bounds, &seed(30), start(), DEFAULT_HORIZON)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(steps.len(), 365);
        assert_eq!(steps[0].date, start());
        assert_eq!(steps[364].date, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert!(steps.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(model.calls.get(), 365);
    }

    #[test]
    fn test_single_step_slides_window_and_computes_cyclical() {
        let model = Drift { length: 30, calls: Cell::new(0), fail_at: None };
        let bounds = bounds();
        let seed = seed(30);
        let mut forecaster = Forecaster::new(&model, &bounds, &seed, start(), 10).unwrap();
        assert_eq!(forecaster.state(), ForecastState::Seeded);

        let step = forecaster.step().unwrap().unwrap();
        assert_eq!(forecaster.state(), ForecastState::Rolling { completed: 1 });

        let window = forecaster.window();
        assert_eq!(window.len(), 30);
        assert_eq!(&window[..29], &seed[1..]);

        let newest = window[29];
        assert_eq!(newest.meteo(), step.values);
        let (sin_doy, cos_doy) = cyclical_features(start());
        assert_eq!(newest.get(Feature::SinDoy), (sin_doy + 1.0) / 2.0);
        assert_eq!(newest.get(Feature::CosDoy), (cos_doy + 1.0) / 2.0);
        // the drift model would have produced 0.30 here if cyclical values were predicted
        assert_ne!(newest.get(Feature::SinDoy), seed[29].0[0] + 0.01);
    }

    #[test]
    fn test_done_after_horizon() {
        let model = Drift { length: 3, calls: Cell::new(0), fail_at: None };
        let bounds = bounds();
        let mut forecaster = Forecaster::new(&model, &bounds, &seed(3), start(), 2).unwrap();
        assert!(forecaster.step().unwrap().is_some());
        assert!(forecaster.step().unwrap().is_some());
        assert_eq!(forecaster.state(), ForecastState::Done);
        assert!(forecaster.step().unwrap().is_none());
        assert_eq!(forecaster.steps().len(), 2);
    }

    #[test]
    fn test_failed_prediction_aborts_whole_rollout() {
        let model = Drift { length: 5, calls: Cell::new(0), fail_at: Some(7) };
        let bounds = bounds();
        let err = Forecaster::new(&model, &bounds, &seed(5), start(), 365)
            .unwrap()
            .run()
            .unwrap_err();
        assert!(matches!(err, ForecastError::ForecastAborted { step: 7, .. }));
    }

    #[test]
    fn test_values_are_not_clamped() {
        let model = Drift { length: 2, calls: Cell::new(0), fail_at: None };
        let bounds = bounds();
        let steps = Forecaster::new(&model, &bounds, &[NormalizedVector([0.99; FEATURE_COUNT]); 2], start(), 5)
            .unwrap()
            .run()
            .unwrap();
        assert!(steps[4].values[0] > 1.0);
    }

    #[test]
    fn test_seed_length_must_match() {
        let model = Drift { length: 4, calls: Cell::new(0), fail_at: None };
        let bounds = bounds();
        assert!(Forecaster::new(&model, &bounds, &seed(3), start(), 1).is_err());
    }
}
