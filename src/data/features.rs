use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::data::observation::CleanedFact;

/// Number of meteorological channels (predicted by the model).
pub const METEO_FEATURES: usize = 6;

/// Total width of an encoded vector: meteorological channels plus the two cyclical ones.
pub const FEATURE_COUNT: usize = METEO_FEATURES + 2;

/// Period used for the day-of-year encoding. Leap days are not renormalized.
pub const DAYS_PER_CYCLE: f64 = 365.0;

/// A predicted or observed set of the six meteorological values.
pub type MeteoVector = [f64; METEO_FEATURES];

/// Feature columns in encoded order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Tavg,
    Tmin,
    Tmax,
    Prcp,
    Wspd,
    Pres,
    SinDoy,
    CosDoy,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Tavg,
        Feature::Tmin,
        Feature::Tmax,
        Feature::Prcp,
        Feature::Wspd,
        Feature::Pres,
        Feature::SinDoy,
        Feature::CosDoy,
    ];

    pub const METEO: [Feature; METEO_FEATURES] = [
        Feature::Tavg,
        Feature::Tmin,
        Feature::Tmax,
        Feature::Prcp,
        Feature::Wspd,
        Feature::Pres,
    ];

    /// Column index inside an encoded or normalized vector.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::Tavg => "tavg",
            Feature::Tmin => "tmin",
            Feature::Tmax => "tmax",
            Feature::Prcp => "prcp",
            Feature::Wspd => "wspd",
            Feature::Pres => "pres",
            Feature::SinDoy => "sin_doy",
            Feature::CosDoy => "cos_doy",
        }
    }

    pub fn is_cyclical(self) -> bool {
        matches!(self, Feature::SinDoy | Feature::CosDoy)
    }
}

/// A cleaned fact in physical units extended with its cyclical day-of-year encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodedVector {
    pub date: NaiveDate,
    pub values: [f64; FEATURE_COUNT],
}

impl EncodedVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }
}

/// An encoded vector mapped through fitted feature bounds.
///
/// Values are nominally in [0, 1] but are never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVector(pub [f64; FEATURE_COUNT]);

impl NormalizedVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    /// The meteorological subset, dropping the cyclical channels.
    pub fn meteo(&self) -> MeteoVector {
        let mut out = [0.0; METEO_FEATURES];
        out.copy_from_slice(&self.0[..METEO_FEATURES]);
        out
    }

    /// Joins predicted meteorological values with already-normalized cyclical values.
    pub fn from_parts(meteo: MeteoVector, sin_doy: f64, cos_doy: f64) -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        values[..METEO_FEATURES].copy_from_slice(&meteo);
        values[Feature::SinDoy.index()] = sin_doy;
        values[Feature::CosDoy.index()] = cos_doy;
        NormalizedVector(values)
    }
}

/// `(sin(2πd/365), cos(2πd/365))` for the ordinal day `d` of `date`.
///
/// Shared by the encoder and the forecaster so historical and future dates agree bit for bit.
pub fn cyclical_features(date: NaiveDate) -> (f64, f64) {
    let angle = 2.0 * PI * date.ordinal() as f64 / DAYS_PER_CYCLE;
    (angle.sin(), angle.cos())
}

/// Derives the cyclical features and assembles full feature vectors.
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn encode(fact: &CleanedFact) -> EncodedVector {
        let (sin_doy, cos_doy) = cyclical_features(fact.date);
        let mut values = [0.0; FEATURE_COUNT];
        values[..METEO_FEATURES].copy_from_slice(&fact.values);
        values[Feature::SinDoy.index()] = sin_doy;
        values[Feature::CosDoy.index()] = cos_doy;
        EncodedVector { date: fact.date, values }
    }

    pub fn encode_all(facts: &[CleanedFact]) -> Vec<EncodedVector> {
        facts.iter().map(Self::encode).collect()
    }
}
