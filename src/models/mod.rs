/// Model traits and the frozen post-training wrapper.
pub mod regressor;

/// Stacked LSTM sequence regressor.
pub mod lstm_regressor;
