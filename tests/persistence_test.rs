use chrono::NaiveDate;
use tempfile::tempdir;
use weather_lstm::*;

fn records(days: usize) -> Vec<RawRecord> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    (0..days)
        .map(|i| {
            let t = i as f64;
            let date = start + chrono::Duration::days(i as i64);
            RawRecord::new(
                date.format("%Y-%m-%d").to_string(),
                [
                    RawField::from(12.0 + 10.0 * (t / 30.0).sin()),
                    RawField::from(5.0 + 8.0 * (t / 30.0).sin()),
                    RawField::from(19.0 + 11.0 * (t / 30.0).sin()),
                    RawField::from(if i % 4 == 0 { 3.5 } else { 0.0 }),
                    RawField::from(9.0 + 2.0 * (t / 7.0).cos()),
                    RawField::from(1010.0 + 4.0 * (t / 11.0).sin()),
                ],
            )
        })
        .collect()
}

fn fitted() -> FittedPipeline {
    let mut config = ForecastConfig::default();
    config.sequence_length = 7;
    config.horizon = 20;
    config.model.hidden_sizes = vec![5, 3];
    config.training.epochs = 2;
    ForecastPipeline::new(config).unwrap().fit(&records(130)).unwrap()
}

#[test]
fn test_pipeline_save_load_json() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("weather_model.json");

    let original = fitted();
    let before = original.forecast().unwrap();

    original.save(&file_path).unwrap();
    assert!(file_path.exists());

    let contents = std::fs::read_to_string(&file_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(json["metadata"]["model_name"], "weather-lstm");
    assert_eq!(json["metadata"]["sequence_length"], 7);

    let loaded = FittedPipeline::load(&file_path).unwrap();
    assert_eq!(loaded.bounds(), original.bounds());
    assert_eq!(loaded.last_observed(), original.last_observed());
    assert_eq!(loaded.report(), original.report());
    assert_eq!(loaded.forecast().unwrap(), before);
}

#[test]
fn test_pipeline_save_load_binary() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("weather_model.bin");

    let original = fitted();
    original.save(&file_path).unwrap();

    let loaded = FittedPipeline::load(&file_path).unwrap();
    assert_eq!(loaded.seed_window(), original.seed_window());
    assert_eq!(loaded.horizon(), 20);
    assert_eq!(loaded.forecast().unwrap(), original.forecast().unwrap());
}

#[test]
fn test_artifact_metadata() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("weather_model.json");
    fitted().save(&file_path).unwrap();

    let artifact = ModelPersistence::load(&file_path).unwrap();
    assert_eq!(artifact.metadata.hidden_sizes, vec![5, 3]);
    assert_eq!(artifact.metadata.epochs_run, artifact.report.epochs_run());
    assert_eq!(artifact.metadata.version, env!("CARGO_PKG_VERSION"));
    assert!(chrono::DateTime::parse_from_rfc3339(&artifact.metadata.created_at).is_ok());
    assert_eq!(artifact.seed_window.len(), 7);
}

#[test]
fn test_loading_missing_file_fails() {
    let dir = tempdir().unwrap();
    let err = FittedPipeline::load(dir.path().join("missing.bin")).unwrap_err();
    assert!(matches!(err, ForecastError::Io(_)));
}

#[test]
fn test_loading_garbage_fails() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("broken.json");
    std::fs::write(&file_path, "{ not json").unwrap();
    let err = FittedPipeline::load(&file_path).unwrap_err();
    assert!(matches!(err, ForecastError::Serialization(_)));
}

#[test]
fn test_loading_tampered_weights_fails() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("weather_model.json");
    fitted().save(&file_path).unwrap();

    // recurrent weights of the first layer reshaped to (4 * hidden, 1)
    let mut json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&file_path).unwrap()).unwrap();
    let w_hh = &mut json["network"]["cells"][0]["w_hh"];
    let data: Vec<f64> = w_hh["data"].as_array().unwrap().iter().take(20).map(|v| v.as_f64().unwrap()).collect();
    w_hh["data"] = serde_json::json!(data);
    w_hh["shape"] = serde_json::json!([20, 1]);
    std::fs::write(&file_path, serde_json::to_string(&json).unwrap()).unwrap();

    let err = FittedPipeline::load(&file_path).unwrap_err();
    assert!(matches!(err, ForecastError::DimensionMismatch { expected: 5, got: 1 }));
}
