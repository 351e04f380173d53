use chrono::{Duration, NaiveDate};
use std::env;
use weather_lstm::{
    load_raw_records_json, write_records_json, ForecastConfig, ForecastPipeline, RawField, RawRecord,
};

fn main() -> weather_lstm::Result<()> {
    println!("One-Year Weather Forecast");
    println!("=========================\n");

    // usage: forecast_year [observations.json] [forecast.json]
    let args: Vec<String> = env::args().collect();
    let raw = match args.get(1) {
        Some(path) => {
            println!("Loading observations from {}", path);
            load_raw_records_json(path)?
        }
        None => {
            println!("No input given, generating two years of synthetic observations");
            synthetic_observations(730)
        }
    };
    let output = args.get(2).cloned().unwrap_or_else(|| "forecast.json".to_string());

    // small network so the demo finishes quickly
    let mut config = ForecastConfig::default();
    config.model.hidden_sizes = vec![16, 8];
    config.training.epochs = 10;

    let pipeline = ForecastPipeline::new(config)?;
    let fitted = pipeline.fit(&raw)?;

    let report = fitted.report();
    for metrics in &report.history {
        println!(
            "  epoch {:2}  loss {:.5}  mae {:.5}  val_loss {:.5}",
            metrics.epoch,
            metrics.train_loss,
            metrics.train_mae,
            metrics.validation_loss.unwrap_or(f64::NAN)
        );
    }
    println!(
        "Trained for {} epochs, best epoch {:?}, best validation loss {:?}",
        report.epochs_run(),
        report.best_epoch,
        report.best_score
    );

    let forecast = fitted.forecast()?;
    println!("\nFirst week of the forecast:");
    for record in forecast.iter().take(7) {
        println!(
            "  {}  tavg {:6.2}  tmin {:6.2}  tmax {:6.2}  prcp {:5.2}  wspd {:5.2}  pres {:7.2}",
            record.date, record.tavg, record.tmin, record.tmax, record.prcp, record.wspd, record.pres
        );
    }

    write_records_json(&forecast, &output)?;
    println!("\nWrote {} days to {}", forecast.len(), output);
    Ok(())
}

/// Seasonal temperatures with weekly wind and occasional rain, formatted like a spreadsheet export.
fn synthetic_observations(days: usize) -> Vec<RawRecord> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default();
    (0..days)
        .map(|i| {
            let t = i as f64;
            let season = (2.0 * std::f64::consts::PI * (t - 100.0) / 365.0).sin();
            let noise = ((t * 12.9898).sin() * 43758.5453).fract();
            let date = start + Duration::days(i as i64);
            RawRecord::new(
                date.format("%Y-%m-%d").to_string(),
                [
                    RawField::from(format!("{:.1}", 16.0 + 10.0 * season + 2.0 * noise).replace('.', ",")),
                    RawField::from(9.0 + 8.0 * season + noise),
                    RawField::from(23.0 + 11.0 * season + 2.0 * noise),
                    RawField::from(if noise > 0.6 { 8.0 * (noise - 0.6) } else { 0.0 }),
                    RawField::from(12.0 + 3.0 * (t / 7.0).cos()),
                    RawField::from(1013.0 + 6.0 * noise),
                ],
            )
        })
        .collect()
}
