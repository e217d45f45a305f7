//! NetGuard analyzer: windowed network-traffic threat classification.
//!
//! Modular structure:
//! - [`capture`]: Packet sources (simulated, NDJSON replay) and the producer loop
//! - [`window`]: Tumbling window aggregation
//! - [`features`]: Per-window statistical feature extraction
//! - [`classifier`]: Rule-based or model-backed threat classification
//! - [`model`]: Trained artifacts (JSON tree ensemble, ONNX)
//! - [`pipeline`]: Controller state machine, bounded queue, cancellation
//! - [`stats`]: Run-wide counters and snapshots
//! - [`storage`]: Prediction and stats sinks (JSON files, SQLite)
//! - [`logging`]: Structured logging

pub mod config;
pub mod error;
pub mod packet;
pub mod capture;
pub mod window;
pub mod features;
pub mod classifier;
pub mod model;
pub mod stats;
pub mod storage;
pub mod logging;
pub mod pipeline;

pub use config::AnalyzerConfig;
pub use capture::{CaptureSource, IterSource};
pub use classifier::{Classifier, Prediction, ThreatType, Verdict};
pub use features::{extract, FeatureVector};
pub use logging::StructuredLogger;
pub use packet::{PacketRecord, RawPacketRecord};
pub use pipeline::{CancellationToken, Pipeline, PipelineHandle, PipelineState};
pub use stats::StatsSnapshot;
pub use storage::OutputSink;
pub use window::{Window, WindowAggregator};
