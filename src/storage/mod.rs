//! Persistence collaborators for predictions and stats snapshots.

mod json;
mod sqlite;

pub use json::JsonFileSink;
pub use sqlite::SqliteStore;

use crate::classifier::Prediction;
use crate::config::{OutputConfig, OutputFormat};
use crate::error::PersistenceError;
use crate::stats::StatsSnapshot;

/// Append-only predictions, overwrite-in-place stats.
pub trait OutputSink: Send {
    fn append_prediction(&mut self, prediction: &Prediction) -> Result<(), PersistenceError>;
    fn write_stats(&mut self, stats: &StatsSnapshot) -> Result<(), PersistenceError>;
}

/// Opens the sink selected by `config`, creating the output directory.
pub fn open_sink(config: &OutputConfig) -> Result<Box<dyn OutputSink>, PersistenceError> {
    std::fs::create_dir_all(&config.dir)?;
    let sink: Box<dyn OutputSink> = match config.format {
        OutputFormat::Json => Box::new(JsonFileSink::open(&config.dir)?),
        OutputFormat::Sqlite => Box::new(SqliteStore::open(&config.dir.join("netguard.db"))?),
    };
    tracing::info!(format = ?config.format, dir = %config.dir.display(), "output sink ready");
    Ok(sink)
}
