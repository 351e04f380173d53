/// Raw record parsing and cleaning.
pub mod observation;
/// Cyclical encoding and feature vector types.
pub mod features;
/// Min/max feature bounds and the invertible normalization.
pub mod scaler;
/// Sliding windows over the normalized series.
pub mod window;
