use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors raised by the forecasting pipeline.
///
/// Every condition is terminal for the current run; nothing is retried.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Too few usable observations survived cleaning.
    #[error("data quality: only {valid} valid records after cleaning, at least {required} required")]
    DataQuality { valid: usize, required: usize },

    /// Scaler bounds were requested before `fit` was called.
    #[error("scaler must be fitted before transform or inverse_transform")]
    NotFitted,

    /// `fit` was called twice on the same scaler.
    #[error("scaler has already been fitted")]
    AlreadyFitted,

    /// Not enough normalized vectors to form a single window.
    #[error("insufficient history: need at least {needed} vectors, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    /// Not enough windows to form both a training and a validation split.
    #[error("insufficient data: need at least {needed} windows, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A prediction inside the rollout failed; the whole horizon is discarded.
    #[error("forecast aborted at step {step}: {reason}")]
    ForecastAborted { step: usize, reason: String },

    /// Training produced a non-finite loss.
    #[error("training diverged at epoch {epoch}: loss is {loss}")]
    TrainingDiverged { epoch: usize, loss: f64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ForecastError {
    fn from(error: serde_json::Error) -> Self {
        ForecastError::Serialization(error.to_string())
    }
}

impl From<bincode::Error> for ForecastError {
    fn from(error: bincode::Error) -> Self {
        ForecastError::Serialization(error.to_string())
    }
}
