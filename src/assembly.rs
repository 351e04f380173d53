use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data::features::Feature;
use crate::data::scaler::FeatureBounds;
use crate::error::Result;
use crate::forecast::ForecastStep;

/// One forecast day in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub date: NaiveDate,
    pub tavg: f64,
    pub tmin: f64,
    pub tmax: f64,
    pub prcp: f64,
    pub wspd: f64,
    pub pres: f64,
}

/// Denormalizes forecast steps and stamps step `k` with `start_date + k` days.
pub fn assemble(steps: &[ForecastStep], start_date: NaiveDate, bounds: &FeatureBounds) -> Result<Vec<ForecastRecord>> {
    steps
        .iter()
        .enumerate()
        .map(|(k, step)| {
            let values = bounds.inverse_transform(&step.values, &Feature::METEO)?;
            Ok(ForecastRecord {
                date: start_date + Duration::days(k as i64),
                tavg: values[0],
                tmin: values[1],
                tmax: values[2],
                prcp: values[3],
                wspd: values[4],
                pres: values[5],
            })
        })
        .collect()
}

/// Writes records as a pretty-printed JSON array.
pub fn write_records_json<P: AsRef<Path>>(records: &[ForecastRecord], path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}
