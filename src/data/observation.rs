use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::data::features::{Feature, MeteoVector, METEO_FEATURES};
use crate::error::{ForecastError, Result};

/// Minimum number of valid rows needed before any numeric work starts.
pub const MIN_VALID_RECORDS: usize = 100;

/// Glyphs used by upstream exports to mark a missing value.
const PLACEHOLDER_GLYPHS: [char; 3] = ['—', '–', '−'];

/// A raw field as it appears in an export: a number, a locale-formatted string, or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Text(String),
}

impl From<f64> for RawField {
    fn from(value: f64) -> Self {
        RawField::Number(value)
    }
}

impl From<String> for RawField {
    fn from(value: String) -> Self {
        RawField::Text(value)
    }
}

impl From<&str> for RawField {
    fn from(value: &str) -> Self {
        RawField::Text(value.to_string())
    }
}

/// One untrusted row of daily observations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(alias = "time")]
    pub date: String,
    #[serde(default)]
    pub tavg: Option<RawField>,
    #[serde(default)]
    pub tmin: Option<RawField>,
    #[serde(default)]
    pub tmax: Option<RawField>,
    #[serde(default)]
    pub prcp: Option<RawField>,
    #[serde(default)]
    pub wspd: Option<RawField>,
    #[serde(default)]
    pub pres: Option<RawField>,
}

impl RawRecord {
    /// Builds a record from a date and the six fields in `[tavg, tmin, tmax, prcp, wspd, pres]` order.
    pub fn new<F: Into<RawField>>(date: impl Into<String>, fields: [F; METEO_FEATURES]) -> Self {
        let [tavg, tmin, tmax, prcp, wspd, pres] = fields.map(|f| Some(f.into()));
        RawRecord { date: date.into(), tavg, tmin, tmax, prcp, wspd, pres }
    }

    fn field(&self, feature: Feature) -> Option<&RawField> {
        match feature {
            Feature::Tavg => self.tavg.as_ref(),
            Feature::Tmin => self.tmin.as_ref(),
            Feature::Tmax => self.tmax.as_ref(),
            Feature::Prcp => self.prcp.as_ref(),
            Feature::Wspd => self.wspd.as_ref(),
            Feature::Pres => self.pres.as_ref(),
            Feature::SinDoy | Feature::CosDoy => None,
        }
    }
}

/// A validated day: all six meteorological values present and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanedFact {
    pub date: NaiveDate,
    /// `[tavg, tmin, tmax, prcp, wspd, pres]`
    pub values: MeteoVector,
}

/// Coerces a raw field to a finite number, or `None` when it is unusable.
///
/// Comma decimals become dots and placeholder dashes are stripped before parsing.
pub fn coerce_numeric(field: &RawField) -> Option<f64> {
    let value = match field {
        RawField::Number(n) => *n,
        RawField::Text(text) => {
            let normalized: String = text
                .replace(',', ".")
                .chars()
                .filter(|c| !PLACEHOLDER_GLYPHS.contains(c))
                .collect();
            normalized.trim().parse::<f64>().ok()?
        }
    };
    value.is_finite().then_some(value)
}

/// Parses `YYYY-MM-DD`, tolerating a trailing `HH:MM:SS` or ISO `T` time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Turns raw rows into strictly date-ordered, de-duplicated facts.
#[derive(Debug, Clone)]
pub struct ObservationCleaner {
    pub min_valid_records: usize,
}

impl Default for ObservationCleaner {
    fn default() -> Self {
        ObservationCleaner { min_valid_records: MIN_VALID_RECORDS }
    }
}

impl ObservationCleaner {
    pub fn new(min_valid_records: usize) -> Self {
        ObservationCleaner { min_valid_records }
    }

    /// Cleans a single row; `None` if the date or any meteorological field is unusable.
    pub fn clean_record(record: &RawRecord) -> Option<CleanedFact> {
        let date = parse_date(&record.date)?;
        let mut values = [0.0; METEO_FEATURES];
        for feature in Feature::METEO {
            values[feature.index()] = coerce_numeric(record.field(feature)?)?;
        }
        Some(CleanedFact { date, values })
    }

    /// Cleans, sorts and de-duplicates the records.
    ///
    /// When several rows share a date the first one in input order wins.
    pub fn clean(&self, records: &[RawRecord]) -> Result<Vec<CleanedFact>> {
        let mut facts: Vec<CleanedFact> = records.iter().filter_map(Self::clean_record).collect();
        let dropped = records.len() - facts.len();

        // stable sort keeps input order among equal dates
        facts.sort_by_key(|fact| fact.date);
        let before_dedup = facts.len();
        facts.dedup_by_key(|fact| fact.date);
        let duplicates = before_dedup - facts.len();

        info!(
            "Cleaned {} raw records: {} kept, {} dropped, {} duplicate dates removed",
            records.len(),
            facts.len(),
            dropped,
            duplicates
        );

        if facts.len() < self.min_valid_records {
            return Err(ForecastError::DataQuality {
                valid: facts.len(),
                required: self.min_valid_records,
            });
        }

        if let (Some(first), Some(last)) = (facts.first(), facts.last()) {
            debug!("Observation range {} .. {}", first.date, last.date);
        }
        Ok(facts)
    }
}

/// Reads a JSON array of raw records.
pub fn load_raw_records_json<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let file = File::open(path)?;
    let records = serde_json::from_reader(BufReader::new(file))?;
    Ok(records)
}
