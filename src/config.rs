use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::data::observation::MIN_VALID_RECORDS;
use crate::data::window::DEFAULT_SEQUENCE_LENGTH;
use crate::error::{ForecastError, Result};
use crate::forecast::DEFAULT_HORIZON;
use crate::models::lstm_regressor::ModelConfig;
use crate::training::TrainingConfig;

/// Settings for one end-to-end forecasting run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub sequence_length: usize,
    pub horizon: usize,
    pub min_valid_records: usize,
    /// First forecast date. Defaults to the day after the last observation.
    pub start_date: Option<NaiveDate>,
    pub model: ModelConfig,
    pub training: TrainingConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            horizon: DEFAULT_HORIZON,
            min_valid_records: MIN_VALID_RECORDS,
            start_date: None,
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl ForecastConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: ForecastConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(ForecastError::InvalidParameter("sequence_length must be positive".into()));
        }
        if self.horizon == 0 {
            return Err(ForecastError::InvalidParameter("horizon must be positive".into()));
        }
        self.model.validate()?;
        self.training.validate()
    }
}
