//! Error kinds for the analysis pipeline. Only capture failure and an explicit
//! bad model configuration are fatal; everything else degrades per window.

use std::path::PathBuf;
use thiserror::Error;

/// Capture collaborator failure. Terminates the pipeline.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture source unavailable: {0}")]
    Unavailable(String),
    #[error("capture io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("capture producer panicked")]
    Panicked,
}

/// A packet record that cannot be turned into a [`crate::packet::PacketRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedPacket {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("unknown protocol `{0}`")]
    InvalidProtocol(String),
}

/// Model artifact could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model artifact not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read model artifact {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model artifact: {0}")]
    Malformed(String),
    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("unknown class label `{0}`")]
    UnknownClass(String),
    #[error("onnx runtime: {0}")]
    Runtime(String),
}

/// Classifier failed on a well-formed feature vector.
#[derive(Debug, Clone, Error)]
pub enum ClassificationError {
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model returned {got} class probabilities, expected {expected}")]
    OutputShape { expected: usize, got: usize },
    #[error("model returned non-finite probabilities")]
    NonFinite,
}

/// Output sink write failure. Retried once, then logged.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Fatal pipeline outcome.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    /// The output sink could not be opened at startup.
    #[error("output sink: {0}")]
    Sink(#[from] PersistenceError),
    #[error("pipeline already started")]
    AlreadyStarted,
}
