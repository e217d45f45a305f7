//! ONNX Runtime inference. Input: [1, FEATURE_COUNT] f32 in schema order.
//! Output: class probabilities [1, n_classes] (export with zipmap disabled).
//! The schema lives next to the model as `<model>.schema.json`.

use super::ModelSchema;
use crate::error::{ClassificationError, LoadError};
use crate::features::{FeatureVector, FEATURE_COUNT};
use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

const PROBABILITY_OUTPUT: &str = "probabilities";

pub struct OnnxModel {
    // `Session::run` needs exclusive access
    session: Mutex<Session>,
    output_name: String,
    n_classes: usize,
}

fn schema_path(model: &Path) -> PathBuf {
    let mut name = model.as_os_str().to_os_string();
    name.push(".schema.json");
    PathBuf::from(name)
}

impl OnnxModel {
    pub(crate) fn read_schema(model: &Path) -> Result<ModelSchema, LoadError> {
        let path = schema_path(model);
        if !path.exists() {
            return Err(LoadError::NotFound(path));
        }
        let data = std::fs::read(&path).map_err(|source| LoadError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|e| LoadError::Malformed(e.to_string()))
    }

    pub(crate) fn from_bytes(bytes: &[u8], n_classes: usize) -> Result<Self, LoadError> {
        let session = Session::builder()
            .map_err(|e| LoadError::Runtime(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| LoadError::Runtime(e.to_string()))?
            .commit_from_memory(bytes)
            .map_err(|e| LoadError::Runtime(e.to_string()))?;

        if session.inputs.is_empty() {
            return Err(LoadError::Malformed("onnx model declares no inputs".into()));
        }
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == PROBABILITY_OUTPUT)
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .ok_or_else(|| LoadError::Malformed("onnx model declares no outputs".into()))?;

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            n_classes,
        })
    }

    pub(crate) fn predict_proba(
        &self,
        features: &FeatureVector,
    ) -> Result<Vec<f64>, ClassificationError> {
        let arr = Array2::from_shape_vec((1, FEATURE_COUNT), features.to_f32())
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;
        let input =
            Value::from_array(arr).map_err(|e| ClassificationError::Inference(e.to_string()))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;
        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            ClassificationError::Inference(format!("missing output `{}`", self.output_name))
        })?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassificationError::Inference(e.to_string()))?;

        if data.len() != self.n_classes {
            return Err(ClassificationError::OutputShape {
                expected: self.n_classes,
                got: data.len(),
            });
        }
        Ok(data.iter().map(|p| f64::from(*p)).collect())
    }
}
