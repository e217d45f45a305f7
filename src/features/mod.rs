//! Statistical per-window feature extraction.

mod extractor;
pub mod schema;

pub use extractor::{extract, shannon_entropy, SUSPICIOUS_PORTS};
pub use schema::{Feature, FEATURE_COUNT, FEATURE_NAMES};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::ops::{Index, IndexMut};

/// Fixed-schema feature vector, one value per [`Feature`] in schema order.
///
/// Serializes as a name → value map in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "HashMap<String, f64>")]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn zeros() -> Self {
        Self {
            values: [0.0; FEATURE_COUNT],
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Values narrowed to `f32` for model input.
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|v| *v as f32).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.values[f.index()]))
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.values[feature.index()]
    }
}

impl IndexMut<Feature> for FeatureVector {
    fn index_mut(&mut self, feature: Feature) -> &mut f64 {
        &mut self.values[feature.index()]
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.name(), &value)?;
        }
        map.end()
    }
}

impl TryFrom<HashMap<String, f64>> for FeatureVector {
    type Error = String;

    fn try_from(map: HashMap<String, f64>) -> Result<Self, Self::Error> {
        let mut fv = FeatureVector::zeros();
        for feature in Feature::ALL {
            let value = map
                .get(feature.name())
                .ok_or_else(|| format!("missing feature `{}`", feature.name()))?;
            fv[*feature] = *value;
        }
        Ok(fv)
    }
}
