//! End-to-end facade: raw records in, dated physical forecasts out.

use chrono::{Duration, NaiveDate};
use log::info;
use std::path::Path;

use crate::assembly::{assemble, ForecastRecord};
use crate::config::ForecastConfig;
use crate::data::features::{FeatureEncoder, NormalizedVector};
use crate::data::observation::{ObservationCleaner, RawRecord};
use crate::data::scaler::{FeatureBounds, InvertibleScaler};
use crate::data::window::{WindowBuilder, WindowSet};
use crate::error::{ForecastError, Result};
use crate::forecast::Forecaster;
use crate::models::lstm_regressor::LstmRegressor;
use crate::models::regressor::{train, TrainedModel};
use crate::persistence::{ForecastArtifact, ModelMetadata, ModelPersistence};
use crate::training::TrainingReport;

const MODEL_NAME: &str = "weather-lstm";

pub struct ForecastPipeline {
    config: ForecastConfig,
}

impl ForecastPipeline {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(ForecastPipeline { config })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Cleans, encodes, normalizes and windows `raw`, then trains the regressor.
    pub fn fit(&self, raw: &[RawRecord]) -> Result<FittedPipeline> {
        let facts = ObservationCleaner::new(self.config.min_valid_records).clean(raw)?;
        let last_observed = facts
            .last()
            .map(|fact| fact.date)
            .ok_or(ForecastError::InsufficientData { needed: 1, got: 0 })?;

        let encoded = FeatureEncoder::encode_all(&facts);
        let bounds = InvertibleScaler::new().fit(&encoded)?;
        let normalized = bounds.transform_all(&encoded);
        let WindowSet { windows, seed } = WindowBuilder::new(self.config.sequence_length).build(&normalized)?;

        let regressor = LstmRegressor::new(self.config.sequence_length, &self.config.model)?;
        info!(
            "Training LSTM {:?} with {} parameters",
            regressor.hidden_sizes(),
            regressor.num_parameters()
        );
        let model = train(regressor, &windows, &self.config.training)?;

        Ok(FittedPipeline {
            bounds,
            model,
            seed,
            last_observed,
            horizon: self.config.horizon,
            start_date: self.config.start_date,
        })
    }

    /// `fit` followed by `forecast`.
    pub fn run(&self, raw: &[RawRecord]) -> Result<Vec<ForecastRecord>> {
        self.fit(raw)?.forecast()
    }
}

/// Frozen state after training: bounds, model and seed window.
#[derive(Debug, Clone)]
pub struct FittedPipeline {
    bounds: FeatureBounds,
    model: TrainedModel<LstmRegressor>,
    seed: Vec<NormalizedVector>,
    last_observed: NaiveDate,
    horizon: usize,
    start_date: Option<NaiveDate>,
}

impl FittedPipeline {
    pub fn bounds(&self) -> &FeatureBounds {
        &self.bounds
    }

    pub fn model(&self) -> &TrainedModel<LstmRegressor> {
        &self.model
    }

    pub fn report(&self) -> &TrainingReport {
        self.model.report()
    }

    pub fn seed_window(&self) -> &[NormalizedVector] {
        &self.seed
    }

    pub fn last_observed(&self) -> NaiveDate {
        self.last_observed
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// First forecast date: the override if set, else the day after the last observation.
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
            .unwrap_or_else(|| self.last_observed + Duration::days(1))
    }

    /// Rolls the model forward `horizon` days and denormalizes the result.
    pub fn forecast(&self) -> Result<Vec<ForecastRecord>> {
        let start = self.start_date();
        let steps = Forecaster::new(&self.model, &self.bounds, &self.seed, start, self.horizon)?.run()?;
        assemble(&steps, start, &self.bounds)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let regressor = self.model.regressor();
        let artifact = ForecastArtifact {
            metadata: ModelMetadata::new(MODEL_NAME, regressor, self.model.report()),
            network: regressor.into(),
            bounds: self.bounds,
            seed_window: self.seed.clone(),
            last_observed: self.last_observed,
            horizon: self.horizon,
            start_date: self.start_date,
            report: self.model.report().clone(),
        };
        ModelPersistence::save(&artifact, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let artifact = ModelPersistence::load(path)?;
        let regressor = LstmRegressor::try_from(artifact.network)?;
        Ok(FittedPipeline {
            bounds: artifact.bounds,
            model: TrainedModel::from_parts(regressor, artifact.report),
            seed: artifact.seed_window,
            last_observed: artifact.last_observed,
            horizon: artifact.horizon,
            start_date: artifact.start_date,
        })
    }
}
