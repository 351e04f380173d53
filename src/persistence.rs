use chrono::NaiveDate;
use log::info;
use ndarray::{Array2, Dimension};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::data::features::NormalizedVector;
use crate::data::scaler::FeatureBounds;
use crate::error::{ForecastError, Result};
use crate::layers::dropout::Dropout;
use crate::layers::linear::LinearLayer;
use crate::layers::lstm_cell::LSTMCell;
use crate::models::lstm_regressor::LstmRegressor;
use crate::models::regressor::Predictor;
use crate::training::TrainingReport;

/// Serializable version of Array2<f64> for persistence
#[derive(Serialize, Deserialize)]
struct SerializableArray2 {
    data: Vec<f64>,
    shape: (usize, usize),
}

impl From<&Array2<f64>> for SerializableArray2 {
    fn from(array: &Array2<f64>) -> Self {
        Self {
            data: array.iter().cloned().collect(),
            shape: array.raw_dim().into_pattern(),
        }
    }
}

impl TryFrom<SerializableArray2> for Array2<f64> {
    type Error = ForecastError;

    fn try_from(array: SerializableArray2) -> Result<Self> {
        let expected = array.shape.0 * array.shape.1;
        let got = array.data.len();
        Array2::from_shape_vec(array.shape, array.data)
            .map_err(|_| ForecastError::DimensionMismatch { expected, got })
    }
}

/// Serializable LSTM cell parameters
#[derive(Serialize, Deserialize)]
struct SerializableLSTMCell {
    w_ih: SerializableArray2,
    w_hh: SerializableArray2,
    bias: SerializableArray2,
    input_size: usize,
    hidden_size: usize,
}

impl From<&LSTMCell> for SerializableLSTMCell {
    fn from(cell: &LSTMCell) -> Self {
        Self {
            w_ih: (&cell.w_ih).into(),
            w_hh: (&cell.w_hh).into(),
            bias: (&cell.bias).into(),
            input_size: cell.input_size,
            hidden_size: cell.hidden_size,
        }
    }
}

impl TryFrom<SerializableLSTMCell> for LSTMCell {
    type Error = ForecastError;

    fn try_from(cell: SerializableLSTMCell) -> Result<Self> {
        Ok(LSTMCell {
            w_ih: cell.w_ih.try_into()?,
            w_hh: cell.w_hh.try_into()?,
            bias: cell.bias.try_into()?,
            input_size: cell.input_size,
            hidden_size: cell.hidden_size,
        })
    }
}

/// Serializable stacked LSTM regressor
#[derive(Serialize, Deserialize)]
pub struct SerializableRegressor {
    cells: Vec<SerializableLSTMCell>,
    head_weight: SerializableArray2,
    head_bias: SerializableArray2,
    dropout: Dropout,
    sequence_length: usize,
}

impl From<&LstmRegressor> for SerializableRegressor {
    fn from(model: &LstmRegressor) -> Self {
        Self {
            cells: model.layers().iter().map(SerializableLSTMCell::from).collect(),
            head_weight: (&model.head().weight).into(),
            head_bias: (&model.head().bias).into(),
            dropout: model.dropout(),
            sequence_length: model.sequence_length(),
        }
    }
}

impl TryFrom<SerializableRegressor> for LstmRegressor {
    type Error = ForecastError;

    fn try_from(model: SerializableRegressor) -> Result<Self> {
        let cells = model
            .cells
            .into_iter()
            .map(LSTMCell::try_from)
            .collect::<Result<Vec<_>>>()?;
        let head = LinearLayer::from_weights(model.head_weight.try_into()?, model.head_bias.try_into()?);
        LstmRegressor::from_parts(cells, head, model.dropout, model.sequence_length)
    }
}

/// Model metadata for tracking training information
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelMetadata {
    pub model_name: String,
    pub version: String,
    pub created_at: String,
    pub sequence_length: usize,
    pub hidden_sizes: Vec<usize>,
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_validation_loss: Option<f64>,
    pub description: Option<String>,
}

impl ModelMetadata {
    pub fn new(model_name: impl Into<String>, model: &LstmRegressor, report: &TrainingReport) -> Self {
        ModelMetadata {
            model_name: model_name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            sequence_length: model.sequence_length(),
            hidden_sizes: model.hidden_sizes(),
            epochs_run: report.epochs_run(),
            best_epoch: report.best_epoch,
            best_validation_loss: report.best_score,
            description: None,
        }
    }
}

/// Everything needed to forecast again without retraining.
#[derive(Serialize, Deserialize)]
pub struct ForecastArtifact {
    pub metadata: ModelMetadata,
    pub network: SerializableRegressor,
    pub bounds: FeatureBounds,
    pub seed_window: Vec<NormalizedVector>,
    pub last_observed: NaiveDate,
    pub horizon: usize,
    pub start_date: Option<NaiveDate>,
    pub report: TrainingReport,
}

enum Format {
    Json,
    Binary,
}

fn format_for(path: &Path) -> Format {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => Format::Json,
        _ => Format::Binary,
    }
}

/// Artifact persistence operations
pub struct ModelPersistence;

impl ModelPersistence {
    /// Save artifact to JSON format (human-readable)
    pub fn save_to_json<P: AsRef<Path>>(artifact: &ForecastArtifact, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(artifact)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Load artifact from JSON format
    pub fn load_from_json<P: AsRef<Path>>(path: P) -> Result<ForecastArtifact> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save artifact to binary format (compact and fast)
    pub fn save_to_binary<P: AsRef<Path>>(artifact: &ForecastArtifact, path: P) -> Result<()> {
        let encoded = bincode::serialize(artifact)?;
        let mut file = File::create(path)?;
        file.write_all(&encoded)?;
        Ok(())
    }

    /// Load artifact from binary format
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<ForecastArtifact> {
        let mut file = File::open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(bincode::deserialize(&contents)?)
    }

    /// Save by extension: `.json` is JSON, anything else is binary.
    pub fn save<P: AsRef<Path>>(artifact: &ForecastArtifact, path: P) -> Result<()> {
        let path = path.as_ref();
        match format_for(path) {
            Format::Json => Self::save_to_json(artifact, path)?,
            Format::Binary => Self::save_to_binary(artifact, path)?,
        }
        info!("Saved forecast artifact to {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<ForecastArtifact> {
        let path = path.as_ref();
        let artifact = match format_for(path) {
            Format::Json => Self::load_from_json(path)?,
            Format::Binary => Self::load_from_binary(path)?,
        };
        info!("Loaded forecast artifact '{}' from {}", artifact.metadata.model_name, path.display());
        Ok(artifact)
    }
}
