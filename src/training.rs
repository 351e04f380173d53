use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::data::window::{batch_inputs, batch_targets, Window};
use crate::error::{ForecastError, Result};
use crate::loss::{LossFunction, MAELoss, MSELoss};
use crate::models::lstm_regressor::LstmRegressor;
use crate::optimizers::{Adam, Optimizer};

/// Which metric early stopping watches
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarlyStoppingMetric {
    ValidationLoss,
    TrainLoss,
}

/// Configuration for early stopping
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    /// Epochs without improvement before training halts
    pub patience: usize,
    /// Minimum decrease that counts as an improvement
    pub min_delta: f64,
    /// Put the best-epoch weights back once training ends
    pub restore_best_weights: bool,
    pub monitor: EarlyStoppingMetric,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        EarlyStoppingConfig {
            patience: 7,
            min_delta: 0.0,
            restore_best_weights: true,
            monitor: EarlyStoppingMetric::ValidationLoss,
        }
    }
}

/// Configuration for training hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Trailing share of windows held out for validation, in chronological order
    pub validation_fraction: f64,
    pub clip_gradient: Option<f64>,
    pub print_every: usize,
    /// Shuffle training batches each epoch; validation order is never touched
    pub shuffle: bool,
    pub seed: u64,
    pub early_stopping: EarlyStoppingConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 60,
            batch_size: 32,
            learning_rate: 0.001,
            validation_fraction: 0.1,
            clip_gradient: Some(5.0),
            print_every: 1,
            shuffle: true,
            seed: 42,
            early_stopping: EarlyStoppingConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ForecastError::InvalidParameter("epochs must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(ForecastError::InvalidParameter("batch_size must be positive".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ForecastError::InvalidParameter("learning_rate must be positive".into()));
        }
        check_validation_fraction(self.validation_fraction)
    }
}

/// Training metrics tracked during training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_mae: f64,
    pub validation_loss: Option<f64>,
    pub validation_mae: Option<f64>,
    pub time_elapsed: f64,
}

/// Outcome of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub history: Vec<TrainingMetrics>,
    pub best_epoch: Option<usize>,
    pub best_score: Option<f64>,
    pub stopped_epoch: Option<usize>,
    pub restored_best_weights: bool,
}

impl TrainingReport {
    pub fn epochs_run(&self) -> usize {
        self.history.len()
    }

    pub fn final_metrics(&self) -> Option<&TrainingMetrics> {
        self.history.last()
    }
}

/// Tracks the monitored metric and keeps a snapshot of the best model seen.
pub struct EarlyStopper<M: Clone> {
    config: EarlyStoppingConfig,
    best_score: f64,
    best_epoch: Option<usize>,
    wait: usize,
    stopped_epoch: Option<usize>,
    best_model: Option<M>,
}

impl<M: Clone> EarlyStopper<M> {
    pub fn new(config: EarlyStoppingConfig) -> Self {
        EarlyStopper {
            config,
            best_score: f64::INFINITY,
            best_epoch: None,
            wait: 0,
            stopped_epoch: None,
            best_model: None,
        }
    }

    /// Returns `(should_stop, is_best)` for the epoch described by `metrics`.
    pub fn should_stop(&mut self, metrics: &TrainingMetrics, model: &M) -> (bool, bool) {
        let score = match self.config.monitor {
            EarlyStoppingMetric::ValidationLoss => metrics.validation_loss.unwrap_or(metrics.train_loss),
            EarlyStoppingMetric::TrainLoss => metrics.train_loss,
        };

        if score < self.best_score - self.config.min_delta {
            self.best_score = score;
            self.best_epoch = Some(metrics.epoch);
            self.wait = 0;
            if self.config.restore_best_weights {
                self.best_model = Some(model.clone());
            }
            return (false, true);
        }

        self.wait += 1;
        if self.wait >= self.config.patience {
            self.stopped_epoch = Some(metrics.epoch);
            return (true, false);
        }
        (false, false)
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }

    /// Hands over the best snapshot, if one was kept.
    pub fn take_best(&mut self) -> Option<M> {
        self.best_model.take()
    }
}

fn split_index(len: usize, validation_fraction: f64) -> usize {
    (len as f64 * (1.0 - validation_fraction)).floor() as usize
}

/// Upper bound on the set size probed when reporting how many windows a split needs.
const MAX_SPLIT_SEARCH: usize = 1 << 16;

/// Accepts fractions in (0, 1) whose training share is strictly between 0 and 1 in `f64`.
///
/// A fraction small enough that `1.0 - fraction == 1.0` never yields a validation window.
fn check_validation_fraction(validation_fraction: f64) -> Result<()> {
    let keep = 1.0 - validation_fraction;
    if !(validation_fraction > 0.0 && validation_fraction < 1.0) || keep >= 1.0 || keep <= 0.0 {
        return Err(ForecastError::InvalidParameter(format!(
            "validation_fraction must be in (0, 1), got {}",
            validation_fraction
        )));
    }
    Ok(())
}

/// Splits `items` into a leading training part and a trailing validation part.
///
/// The cut is purely positional, so the validation set is always the most recent suffix.
pub fn chronological_split<T>(items: &[T], validation_fraction: f64) -> Result<(&[T], &[T])> {
    check_validation_fraction(validation_fraction)?;
    let at = split_index(items.len(), validation_fraction);
    if at == 0 || at == items.len() {
        let needed = (2..MAX_SPLIT_SEARCH)
            .find(|&n| {
                let cut = split_index(n, validation_fraction);
                cut > 0 && cut < n
            })
            .unwrap_or(items.len() + 1);
        return Err(ForecastError::InsufficientData { needed, got: items.len() });
    }
    Ok(items.split_at(at))
}

/// Mini-batch trainer for [`LstmRegressor`] with configurable loss and optimizer
pub struct LSTMTrainer<'a, L: LossFunction, O: Optimizer> {
    network: &'a mut LstmRegressor,
    loss_function: L,
    optimizer: O,
    config: TrainingConfig,
    rng: StdRng,
    metrics_history: Vec<TrainingMetrics>,
}

impl<'a, L: LossFunction, O: Optimizer> LSTMTrainer<'a, L, O> {
    pub fn new(network: &'a mut LstmRegressor, loss_function: L, optimizer: O, config: TrainingConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        LSTMTrainer {
            network,
            loss_function,
            optimizer,
            config,
            rng,
            metrics_history: Vec::new(),
        }
    }

    /// One optimizer step on a batch. Returns `(loss, mae)` for the batch.
    pub fn train_batch(&mut self, batch: &[&Window]) -> (f64, f64) {
        let inputs = batch_inputs(batch);
        let targets = batch_targets(batch);

        let (outputs, cache) = self.network.forward_train(&inputs, &mut self.rng);
        let loss = self.loss_function.compute_loss(&outputs, &targets);
        let mae = MAELoss.compute_loss(&outputs, &targets);

        let d_output = self.loss_function.compute_gradient(&outputs, &targets);
        let mut gradients = self.network.backward(&cache, &d_output);

        if let Some(max_norm) = self.config.clip_gradient {
            gradients.clip(max_norm);
        }
        self.network.update_parameters(&gradients, &mut self.optimizer);

        (loss, mae)
    }

    /// Mean loss and MAE over `windows` in inference mode.
    pub fn evaluate(&self, windows: &[Window]) -> (f64, f64) {
        let mut total_loss = 0.0;
        let mut total_mae = 0.0;
        for chunk in windows.chunks(self.config.batch_size) {
            let batch: Vec<&Window> = chunk.iter().collect();
            let outputs = self.network.forward_batch(&batch_inputs(&batch));
            let targets = batch_targets(&batch);
            let weight = chunk.len() as f64;
            total_loss += self.loss_function.compute_loss(&outputs, &targets) * weight;
            total_mae += MAELoss.compute_loss(&outputs, &targets) * weight;
        }
        let n = windows.len().max(1) as f64;
        (total_loss / n, total_mae / n)
    }

    /// Runs epochs until the budget is spent or early stopping triggers.
    pub fn train(mut self, train_data: &[Window], validation_data: &[Window]) -> Result<TrainingReport> {
        if train_data.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }
        info!(
            "Starting training for up to {} epochs on {} windows ({} validation)",
            self.config.epochs,
            train_data.len(),
            validation_data.len()
        );

        let mut stopper: EarlyStopper<LstmRegressor> = EarlyStopper::new(self.config.early_stopping.clone());
        let mut order: Vec<usize> = (0..train_data.len()).collect();

        for epoch in 0..self.config.epochs {
            let start_time = Instant::now();
            if self.config.shuffle {
                order.shuffle(&mut self.rng);
            }

            let mut epoch_loss = 0.0;
            let mut epoch_mae = 0.0;
            for chunk in order.chunks(self.config.batch_size) {
                let batch: Vec<&Window> = chunk.iter().map(|&i| &train_data[i]).collect();
                let (loss, mae) = self.train_batch(&batch);
                epoch_loss += loss * chunk.len() as f64;
                epoch_mae += mae * chunk.len() as f64;
            }
            epoch_loss /= train_data.len() as f64;
            epoch_mae /= train_data.len() as f64;

            let (validation_loss, validation_mae) = if validation_data.is_empty() {
                (None, None)
            } else {
                let (loss, mae) = self.evaluate(validation_data);
                (Some(loss), Some(mae))
            };

            let metrics = TrainingMetrics {
                epoch,
                train_loss: epoch_loss,
                train_mae: epoch_mae,
                validation_loss,
                validation_mae,
                time_elapsed: start_time.elapsed().as_secs_f64(),
            };

            if !epoch_loss.is_finite() {
                return Err(ForecastError::TrainingDiverged { epoch, loss: epoch_loss });
            }

            if self.config.print_every > 0 && epoch % self.config.print_every == 0 {
                match validation_loss {
                    Some(val_loss) => info!(
                        "Epoch {}: loss {:.6}, mae {:.6}, val_loss {:.6}, val_mae {:.6}, {:.2}s",
                        epoch,
                        epoch_loss,
                        epoch_mae,
                        val_loss,
                        validation_mae.unwrap_or_default(),
                        metrics.time_elapsed
                    ),
                    None => info!(
                        "Epoch {}: loss {:.6}, mae {:.6}, {:.2}s",
                        epoch, epoch_loss, epoch_mae, metrics.time_elapsed
                    ),
                }
            }

            let (should_stop, is_best) = stopper.should_stop(&metrics, &*self.network);
            if is_best {
                debug!("New best score {:.6} at epoch {}", stopper.best_score(), epoch);
            }
            self.metrics_history.push(metrics);

            if should_stop {
                info!(
                    "Early stopping at epoch {}; best epoch was {:?}",
                    epoch,
                    stopper.best_epoch()
                );
                break;
            }
        }

        let mut restored_best_weights = false;
        if let Some(best) = stopper.take_best() {
            *self.network = best;
            restored_best_weights = true;
            info!("Restored weights from epoch {:?}", stopper.best_epoch());
        }

        Ok(TrainingReport {
            history: self.metrics_history,
            best_epoch: stopper.best_epoch(),
            best_score: stopper.best_epoch().map(|_| stopper.best_score()),
            stopped_epoch: stopper.stopped_epoch(),
            restored_best_weights,
        })
    }
}

/// Create a trainer with Adam and MSE loss
pub fn create_adam_trainer(network: &mut LstmRegressor, config: TrainingConfig) -> LSTMTrainer<'_, MSELoss, Adam> {
    let optimizer = Adam::new(config.learning_rate);
    LSTMTrainer::new(network, MSELoss, optimizer, config)
}
