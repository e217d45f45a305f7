//! Window classification: rule-based heuristics or a trained model, chosen
//! once at startup.

mod rules;

pub use rules::{Bound, Condition, Measure, Rule, RuleBasedClassifier};

use crate::error::{ClassificationError, LoadError};
use crate::features::FeatureVector;
use crate::model::ModelBackedClassifier;
use crate::window::Window;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatType {
    Normal,
    PortScan,
    DdosAttack,
    MalwareDetected,
    DataExfiltration,
}

impl ThreatType {
    pub const ALL: &'static [ThreatType] = &[
        ThreatType::Normal,
        ThreatType::PortScan,
        ThreatType::DdosAttack,
        ThreatType::MalwareDetected,
        ThreatType::DataExfiltration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThreatType::Normal => "normal",
            ThreatType::PortScan => "port_scan",
            ThreatType::DdosAttack => "ddos_attack",
            ThreatType::MalwareDetected => "malware_detected",
            ThreatType::DataExfiltration => "data_exfiltration",
        }
    }

    pub fn is_threat(self) -> bool {
        self != ThreatType::Normal
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatType {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThreatType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LoadError::UnknownClass(s.to_string()))
    }
}

/// Clamps to `[0, 1]`; non-finite values become 0.
pub fn bounded_confidence(c: f64) -> f64 {
    if c.is_finite() {
        c.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Raw classifier output for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub threat_type: ThreatType,
    pub confidence: f64,
}

impl Verdict {
    pub fn new(threat_type: ThreatType, confidence: f64) -> Self {
        Self {
            threat_type,
            confidence: bounded_confidence(confidence),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Classification result for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub timestamp: DateTime<Utc>,
    pub window_index: u64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub is_threat: bool,
    pub threat_type: ThreatType,
    pub confidence: f64,
    pub packet_count: usize,
    pub features: FeatureVector,
    /// Set when classification failed and this is the fallback record.
    #[serde(default, skip_serializing_if = "is_false")]
    pub degraded: bool,
}

impl Prediction {
    pub fn new(window: &Window, features: FeatureVector, verdict: Verdict) -> Self {
        Self {
            timestamp: Utc::now(),
            window_index: window.index,
            window_start: window.start,
            window_end: window.end,
            is_threat: verdict.threat_type.is_threat(),
            threat_type: verdict.threat_type,
            confidence: bounded_confidence(verdict.confidence),
            packet_count: window.len(),
            features,
            degraded: false,
        }
    }

    /// Normal, zero-confidence record for a window whose classification failed.
    pub fn degraded(window: &Window, features: FeatureVector) -> Self {
        let mut p = Self::new(window, features, Verdict::new(ThreatType::Normal, 0.0));
        p.degraded = true;
        p
    }
}

/// Describes the active classifier for stats consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierInfo {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_sha256: Option<String>,
}

pub enum Classifier {
    RuleBased(RuleBasedClassifier),
    ModelBacked(ModelBackedClassifier),
}

impl Classifier {
    /// Model-backed when `model_path` is set (load failure is fatal),
    /// rule-based otherwise.
    pub fn from_config(
        model_path: Option<&Path>,
        rules: &crate::config::RuleConfig,
    ) -> Result<Self, LoadError> {
        match model_path {
            Some(path) => {
                let model = ModelBackedClassifier::load(path)?;
                tracing::info!(
                    path = %path.display(),
                    sha256 = %model.checksum(),
                    "model-backed classifier loaded"
                );
                Ok(Classifier::ModelBacked(model))
            }
            None => {
                tracing::info!("no model configured; using rule-based classifier");
                Ok(Classifier::RuleBased(RuleBasedClassifier::new(rules)))
            }
        }
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Verdict, ClassificationError> {
        match self {
            Classifier::RuleBased(c) => Ok(c.predict(features)),
            Classifier::ModelBacked(c) => c.predict(features),
        }
    }

    pub fn info(&self) -> ClassifierInfo {
        match self {
            Classifier::RuleBased(_) => ClassifierInfo {
                kind: "rule_based".into(),
                model_path: None,
                model_sha256: None,
            },
            Classifier::ModelBacked(m) => ClassifierInfo {
                kind: format!("model:{}", m.format()),
                model_path: Some(m.path().to_path_buf()),
                model_sha256: Some(m.checksum().to_string()),
            },
        }
    }
}
