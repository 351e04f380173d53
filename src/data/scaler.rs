use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::data::features::{EncodedVector, Feature, NormalizedVector, FEATURE_COUNT};
use crate::error::{ForecastError, Result};

/// Value a zero-range feature normalizes to.
pub const CONSTANT_FEATURE_VALUE: f64 = 0.0;

/// Per-feature `(min, max)` fitted over the full encoded dataset.
///
/// Immutable once built; every transform and inverse takes it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureBounds {
    min: [f64; FEATURE_COUNT],
    max: [f64; FEATURE_COUNT],
}

impl FeatureBounds {
    /// Computes min and max for every feature. Fails on an empty dataset.
    pub fn fit(vectors: &[EncodedVector]) -> Result<Self> {
        if vectors.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }
        let mut min = [f64::INFINITY; FEATURE_COUNT];
        let mut max = [f64::NEG_INFINITY; FEATURE_COUNT];
        for vector in vectors {
            for (i, &value) in vector.values.iter().enumerate() {
                min[i] = min[i].min(value);
                max[i] = max[i].max(value);
            }
        }
        Ok(FeatureBounds { min, max })
    }

    pub fn min(&self, feature: Feature) -> f64 {
        self.min[feature.index()]
    }

    pub fn max(&self, feature: Feature) -> f64 {
        self.max[feature.index()]
    }

    pub fn range(&self, feature: Feature) -> f64 {
        self.max(feature) - self.min(feature)
    }

    /// `(x - min) / (max - min)`, or the fixed constant when the feature never varied.
    ///
    /// Not clamped: values beyond the fitted range map outside [0, 1].
    pub fn normalize_value(&self, feature: Feature, x: f64) -> f64 {
        let range = self.range(feature);
        if range == 0.0 {
            CONSTANT_FEATURE_VALUE
        } else {
            (x - self.min(feature)) / range
        }
    }

    /// `x * (max - min) + min`. A zero-range feature always inverts to its single value.
    pub fn denormalize_value(&self, feature: Feature, x: f64) -> f64 {
        let range = self.range(feature);
        if range == 0.0 {
            self.min(feature)
        } else {
            x * range + self.min(feature)
        }
    }

    pub fn transform(&self, vector: &EncodedVector) -> NormalizedVector {
        let mut out = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            out[feature.index()] = self.normalize_value(feature, vector.get(feature));
        }
        NormalizedVector(out)
    }

    pub fn transform_all(&self, vectors: &[EncodedVector]) -> Vec<NormalizedVector> {
        vectors.iter().map(|v| self.transform(v)).collect()
    }

    /// Inverts `values`, where `values[k]` belongs to `features[k]`.
    pub fn inverse_transform(&self, values: &[f64], features: &[Feature]) -> Result<Vec<f64>> {
        if values.len() != features.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: features.len(),
                got: values.len(),
            });
        }
        Ok(values
            .iter()
            .zip(features)
            .map(|(&x, &feature)| self.denormalize_value(feature, x))
            .collect())
    }
}

/// Fit-once holder for [`FeatureBounds`].
///
/// Exists for callers that want the fit/transform lifecycle enforced at runtime;
/// the pipeline itself passes the returned bounds around by reference.
#[derive(Debug, Clone, Default)]
pub struct InvertibleScaler {
    bounds: Option<FeatureBounds>,
}

impl InvertibleScaler {
    pub fn new() -> Self {
        InvertibleScaler { bounds: None }
    }

    pub fn fit(&mut self, vectors: &[EncodedVector]) -> Result<FeatureBounds> {
        if self.bounds.is_some() {
            return Err(ForecastError::AlreadyFitted);
        }
        let bounds = FeatureBounds::fit(vectors)?;
        for feature in Feature::ALL {
            if bounds.range(feature) == 0.0 {
                debug!("Feature {} is constant at {}", feature.name(), bounds.min(feature));
            }
        }
        info!("Fitted feature bounds over {} vectors", vectors.len());
        self.bounds = Some(bounds);
        Ok(bounds)
    }

    pub fn is_fitted(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn bounds(&self) -> Result<&FeatureBounds> {
        self.bounds.as_ref().ok_or(ForecastError::NotFitted)
    }

    pub fn transform(&self, vector: &EncodedVector) -> Result<NormalizedVector> {
        Ok(self.bounds()?.transform(vector))
    }

    pub fn inverse_transform(&self, values: &[f64], features: &[Feature]) -> Result<Vec<f64>> {
        self.bounds()?.inverse_transform(values, features)
    }
}
