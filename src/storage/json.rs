//! JSON files for reporting consumers: `predictions.ndjson` (one prediction
//! per line, append only) and `stats.json` (replaced atomically).

use super::OutputSink;
use crate::classifier::Prediction;
use crate::error::PersistenceError;
use crate::stats::StatsSnapshot;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const PREDICTIONS_FILE: &str = "predictions.ndjson";
pub const STATS_FILE: &str = "stats.json";

pub struct JsonFileSink {
    predictions: BufWriter<File>,
    stats_path: PathBuf,
}

impl JsonFileSink {
    pub fn open(dir: &Path) -> Result<Self, PersistenceError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(PREDICTIONS_FILE))?;
        Ok(Self {
            predictions: BufWriter::new(file),
            stats_path: dir.join(STATS_FILE),
        })
    }
}

impl OutputSink for JsonFileSink {
    fn append_prediction(&mut self, prediction: &Prediction) -> Result<(), PersistenceError> {
        let line = serde_json::to_string(prediction)?;
        writeln!(self.predictions, "{}", line)?;
        self.predictions.flush()?;
        Ok(())
    }

    fn write_stats(&mut self, stats: &StatsSnapshot) -> Result<(), PersistenceError> {
        let tmp = self.stats_path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(stats)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.stats_path)?;
        Ok(())
    }
}
