//! # Weather LSTM
//!
//! One-year daily weather forecasting from historical observations.
//!
//! Raw daily records are cleaned, extended with a cyclical day-of-year encoding,
//! normalized with fitted per-feature bounds and sliced into fixed-length windows.
//! A stacked LSTM is trained on those windows with early stopping, then rolled
//! forward autoregressively and the predictions are mapped back to physical units.
//!
//! ## Core Components
//!
//! - **Data**: cleaning, cyclical encoding, invertible scaling and windowing
//! - **Models**: the `SequenceRegressor` capability and the `LstmRegressor` implementation
//! - **Training**: mini-batch BPTT with Adam, gradient clipping and early stopping
//! - **Forecast**: the seeded/rolling/done rollout and result assembly
//! - **Persistence**: fitted artifacts as JSON or bincode
//!
//! ## Quick Start
//!
//! ```no_run
//! use weather_lstm::{load_raw_records_json, write_records_json, ForecastConfig, ForecastPipeline};
//!
//! # fn main() -> weather_lstm::Result<()> {
//! let raw = load_raw_records_json("observations.json")?;
//! let pipeline = ForecastPipeline::new(ForecastConfig::default())?;
//! let forecast = pipeline.run(&raw)?;
//! write_records_json(&forecast, "forecast.json")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod utils;
pub mod data;
pub mod layers;
pub mod models;
pub mod loss;
pub mod optimizers;
pub mod training;
pub mod forecast;
pub mod assembly;
pub mod config;
pub mod persistence;
pub mod pipeline;

// Re-export commonly used items
pub use error::{ForecastError, Result};
pub use data::observation::{load_raw_records_json, ObservationCleaner, RawField, RawRecord};
pub use data::features::{Feature, FeatureEncoder, NormalizedVector};
pub use data::scaler::{FeatureBounds, InvertibleScaler};
pub use data::window::{Window, WindowBuilder};
pub use models::regressor::{train, Predictor, SequenceRegressor, TrainedModel};
pub use models::lstm_regressor::{LstmRegressor, ModelConfig};
pub use training::{EarlyStoppingConfig, TrainingConfig, TrainingReport};
pub use forecast::{ForecastState, ForecastStep, Forecaster};
pub use assembly::{assemble, write_records_json, ForecastRecord};
pub use config::ForecastConfig;
pub use persistence::{ForecastArtifact, ModelMetadata, ModelPersistence};
pub use pipeline::{FittedPipeline, ForecastPipeline};
