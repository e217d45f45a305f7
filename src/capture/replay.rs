//! NDJSON packet replay. Each record is restamped when read so a recorded
//! capture flows through the live windowing unchanged.

use super::CaptureSource;
use crate::error::CaptureError;
use crate::packet::RawPacketRecord;
use chrono::Utc;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct ReplaySource {
    name: String,
    reader: BufReader<File>,
    line: Vec<u8>,
    line_no: u64,
    interval: Option<Duration>,
    next_due: Instant,
}

impl ReplaySource {
    /// `rate` paces records per second; unpaced when `None`.
    pub fn open(path: &Path, rate: Option<u32>) -> Result<Self, CaptureError> {
        let file = File::open(path).map_err(|e| {
            CaptureError::Unavailable(format!("cannot open replay file {}: {}", path.display(), e))
        })?;
        Ok(Self {
            name: format!("replay:{}", path.display()),
            reader: BufReader::new(file),
            line: Vec::new(),
            line_no: 0,
            interval: rate
                .filter(|r| *r > 0)
                .map(|r| Duration::from_secs_f64(1.0 / f64::from(r))),
            next_due: Instant::now(),
        })
    }

    fn pace(&mut self) {
        if let Some(interval) = self.interval {
            let now = Instant::now();
            if self.next_due > now {
                std::thread::sleep(self.next_due - now);
            }
            self.next_due = self.next_due.max(now) + interval;
        }
    }
}

impl CaptureSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_record(&mut self) -> Result<Option<RawPacketRecord>, CaptureError> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if self.line.trim_ascii().is_empty() {
                continue;
            }
            self.pace();
            // An unparsable or non-UTF-8 line is still handed on as an empty
            // record so the consumer counts it as malformed.
            let text = self.line.trim_ascii();
            let mut record = match serde_json::from_slice::<RawPacketRecord>(text) {
                Ok(r) => r,
                Err(e) => {
                    debug!(line = self.line_no, error = %e, "unparsable replay line");
                    return Ok(Some(RawPacketRecord::default()));
                }
            };
            record.timestamp = Some(Utc::now());
            return Ok(Some(record));
        }
    }
}
