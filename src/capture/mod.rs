//! Capture collaborators. A source yields raw packet records one at a time;
//! the producer thread moves them into the bounded queue.

mod replay;
mod simulated;

pub use replay::ReplaySource;
pub use simulated::SimulatedSource;

use crate::config::{CaptureConfig, SourceKind};
use crate::error::CaptureError;
use crate::pipeline::queue::{PacketSender, SendError};
use crate::pipeline::CancellationToken;
use crate::packet::RawPacketRecord;
use chrono::Utc;
use tracing::{debug, info, warn};

pub trait CaptureSource: Send {
    fn name(&self) -> &str;

    /// Next record, `None` when a finite source is exhausted. A pacing source
    /// sleeps at most one inter-packet interval per call; stop requests are
    /// checked between calls.
    fn next_record(&mut self) -> Result<Option<RawPacketRecord>, CaptureError>;
}

/// In-memory source over a fixed sequence of records.
pub struct IterSource {
    name: String,
    records: std::vec::IntoIter<RawPacketRecord>,
    restamp: bool,
}

impl IterSource {
    pub fn new(name: impl Into<String>, records: Vec<RawPacketRecord>) -> Self {
        Self {
            name: name.into(),
            records: records.into_iter(),
            restamp: false,
        }
    }

    /// Stamp each record with the time it is read instead of its own timestamp.
    pub fn restamped(mut self) -> Self {
        self.restamp = true;
        self
    }
}

impl CaptureSource for IterSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_record(&mut self) -> Result<Option<RawPacketRecord>, CaptureError> {
        Ok(self.records.next().map(|mut r| {
            if self.restamp {
                r.timestamp = Some(Utc::now());
            }
            r
        }))
    }
}

/// Builds the source selected by `config`. The interface selector is opaque
/// here and only reported.
pub fn open_source(config: &CaptureConfig) -> Result<Box<dyn CaptureSource>, CaptureError> {
    if let Some(iface) = &config.interface {
        info!(interface = %iface, "interface selector passed to capture source");
    }
    let source: Box<dyn CaptureSource> = match config.source {
        SourceKind::Simulated => Box::new(SimulatedSource::new(
            config.simulated_rate,
            config.simulated_attack_ratio,
            config.seed,
        )),
        SourceKind::Replay => {
            let path = config.replay_path.as_deref().ok_or_else(|| {
                CaptureError::Unavailable("replay source configured without replay_path".into())
            })?;
            Box::new(ReplaySource::open(path, config.replay_rate)?)
        }
    };
    info!(source = source.name(), "capture source ready");
    Ok(source)
}

/// Producer loop: pulls from `source` until it is exhausted, the queue
/// closes or `cancel` fires. Returns the number of records enqueued.
pub fn run_producer(
    mut source: Box<dyn CaptureSource>,
    sender: PacketSender,
    cancel: CancellationToken,
) -> Result<u64, CaptureError> {
    let mut sent = 0u64;
    while !cancel.is_cancelled() {
        let record = match source.next_record() {
            Ok(Some(r)) => r,
            Ok(None) => {
                info!(source = source.name(), sent, "capture source exhausted");
                break;
            }
            Err(e) => {
                warn!(source = source.name(), error = %e, "capture source failed");
                return Err(e);
            }
        };
        match sender.send(record) {
            Ok(()) => sent += 1,
            Err(SendError::Cancelled) => {
                debug!("stop requested during blocked send");
                break;
            }
            Err(SendError::Closed) => {
                debug!("packet queue closed");
                break;
            }
        }
    }
    Ok(sent)
}
