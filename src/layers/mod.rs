/// LSTM cell with batched forward and backward passes.
pub mod lstm_cell;
/// Dense output head.
pub mod linear;
/// Inverted dropout between stacked recurrent layers.
pub mod dropout;
