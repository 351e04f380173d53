use weather_lstm::*;
use weather_lstm::training::{chronological_split, EarlyStoppingMetric};

fn windows(count: usize, length: usize) -> Vec<Window> {
    (0..count)
        .map(|i| {
            let day = |t: usize| {
                let phase = (i + t) as f64 / 12.0;
                NormalizedVector([
                    0.5 + 0.4 * phase.sin(),
                    0.45 + 0.35 * phase.sin(),
                    0.55 + 0.4 * phase.sin(),
                    0.1,
                    0.5 + 0.2 * phase.cos(),
                    0.5,
                    0.5 + 0.5 * phase.sin(),
                    0.5 + 0.5 * phase.cos(),
                ])
            };
            let next = day(length);
            Window {
                inputs: (0..length).map(day).collect(),
                target: next.meteo(),
            }
        })
        .collect()
}

fn small_model(length: usize) -> LstmRegressor {
    LstmRegressor::new(length, &ModelConfig { hidden_sizes: vec![6, 4], dropout: 0.1, seed: 3 }).unwrap()
}

/// Early stopping triggers as soon as patience runs out
#[test]
fn test_early_stopping_triggers() {
    let config = TrainingConfig {
        epochs: 50,
        batch_size: 8,
        learning_rate: 0.01,
        early_stopping: EarlyStoppingConfig {
            patience: 2,
            // nothing after the first epoch can beat the best score by this much
            min_delta: 1e6,
            restore_best_weights: true,
            monitor: EarlyStoppingMetric::ValidationLoss,
        },
        ..TrainingConfig::default()
    };

    let trained = train(small_model(6), &windows(60, 6), &config).unwrap();
    let report = trained.report();

    assert_eq!(report.best_epoch, Some(0));
    assert_eq!(report.stopped_epoch, Some(2));
    assert_eq!(report.epochs_run(), 3);
    assert!(report.restored_best_weights);
    assert!(report.history.iter().all(|m| m.validation_loss.is_some()));
}

/// Training runs the whole budget when patience is never exhausted
#[test]
fn test_full_budget_without_stopping() {
    let config = TrainingConfig {
        epochs: 4,
        batch_size: 16,
        early_stopping: EarlyStoppingConfig { patience: 100, ..EarlyStoppingConfig::default() },
        ..TrainingConfig::default()
    };

    let trained = train(small_model(5), &windows(40, 5), &config).unwrap();
    assert_eq!(trained.report().epochs_run(), 4);
    assert_eq!(trained.report().stopped_epoch, None);
    assert!(trained.report().best_epoch.is_some());
}

/// Restoring can be switched off
#[test]
fn test_no_restore_when_disabled() {
    let config = TrainingConfig {
        epochs: 3,
        early_stopping: EarlyStoppingConfig { restore_best_weights: false, ..EarlyStoppingConfig::default() },
        ..TrainingConfig::default()
    };

    let trained = train(small_model(4), &windows(30, 4), &config).unwrap();
    assert!(!trained.report().restored_best_weights);
}

/// Training lowers the validation loss on a smooth signal
#[test]
fn test_validation_loss_improves() {
    let config = TrainingConfig {
        epochs: 15,
        batch_size: 8,
        learning_rate: 0.01,
        ..TrainingConfig::default()
    };

    let trained = train(small_model(6), &windows(80, 6), &config).unwrap();
    let history = &trained.report().history;
    let first = history[0].validation_loss.unwrap();
    let best = trained.report().best_score.unwrap();
    assert!(best < first);
}

/// The validation set is always the most recent contiguous suffix
#[test]
fn test_validation_split_is_chronological() {
    let items: Vec<usize> = (0..95).collect();
    let (train_part, validation_part) = chronological_split(&items, 0.1).unwrap();

    assert_eq!(train_part.len(), 85);
    assert_eq!(validation_part, &items[85..]);
    assert_eq!(train_part.last().map(|v| v + 1), validation_part.first().copied());
}
