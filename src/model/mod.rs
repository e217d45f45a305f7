//! Trained classifier artifacts. Loaded once; the feature schema and class
//! labels are validated before the first window is processed.

mod forest;
mod onnx;

pub use forest::{ForestArtifact, Node, Tree};
pub use onnx::OnnxModel;

use crate::classifier::{ThreatType, Verdict};
use crate::error::{ClassificationError, LoadError};
use crate::features::{schema, FeatureVector};
use forest::ForestModel;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Feature names and class labels the artifact was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub feature_names: Vec<String>,
    pub classes: Vec<String>,
    /// Pins [`schema::schema_hash`] when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_hash: Option<String>,
}

impl ModelSchema {
    pub fn current(classes: &[ThreatType]) -> Self {
        Self {
            feature_names: schema::FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            classes: classes.iter().map(|c| c.as_str().to_string()).collect(),
            schema_hash: Some(schema::schema_hash()),
        }
    }

    /// Checks the feature layout and resolves class labels.
    fn validate(&self) -> Result<Vec<ThreatType>, LoadError> {
        schema::check_schema(&self.feature_names).map_err(LoadError::SchemaMismatch)?;
        if let Some(ref pinned) = self.schema_hash {
            let ours = schema::schema_hash();
            if *pinned != ours {
                return Err(LoadError::SchemaMismatch(format!(
                    "schema hash {} does not match {}",
                    pinned, ours
                )));
            }
        }
        if self.classes.is_empty() {
            return Err(LoadError::Malformed("artifact declares no classes".into()));
        }
        self.classes.iter().map(|c| c.parse()).collect()
    }
}

enum TrainedModel {
    Forest(ForestModel),
    Onnx(OnnxModel),
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Classifier backed by a trained artifact (`.onnx` with a schema sidecar,
/// anything else parsed as a JSON forest).
pub struct ModelBackedClassifier {
    model: TrainedModel,
    classes: Vec<ThreatType>,
    path: PathBuf,
    checksum: String,
}

impl ModelBackedClassifier {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let bytes = read_artifact(path)?;
        let checksum = sha256_hex(&bytes);
        let is_onnx = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("onnx"));

        let (model, classes) = if is_onnx {
            let schema = OnnxModel::read_schema(path)?;
            let classes = schema.validate()?;
            let model = OnnxModel::from_bytes(&bytes, classes.len())?;
            (TrainedModel::Onnx(model), classes)
        } else {
            let artifact: ForestArtifact = serde_json::from_slice(&bytes)
                .map_err(|e| LoadError::Malformed(e.to_string()))?;
            let classes = artifact.schema.validate()?;
            let model = ForestModel::new(artifact, classes.len())?;
            (TrainedModel::Forest(model), classes)
        };

        Ok(Self {
            model,
            classes,
            path: path.to_path_buf(),
            checksum,
        })
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Verdict, ClassificationError> {
        let probs = match &self.model {
            TrainedModel::Forest(m) => m.predict_proba(features),
            TrainedModel::Onnx(m) => m.predict_proba(features)?,
        };
        if probs.len() != self.classes.len() {
            return Err(ClassificationError::OutputShape {
                expected: self.classes.len(),
                got: probs.len(),
            });
        }
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(ClassificationError::NonFinite);
        }
        // first maximum wins ties, matching argmax
        let (best, p) = probs
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });
        Ok(Verdict::new(self.classes[best], p))
    }

    pub fn classes(&self) -> &[ThreatType] {
        &self.classes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// SHA-256 of the artifact bytes.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn format(&self) -> &'static str {
        match self.model {
            TrainedModel::Forest(_) => "forest",
            TrainedModel::Onnx(_) => "onnx",
        }
    }
}
