//! Double-buffered window aggregation. The Controller decides when to flush;
//! the aggregator only decides which window a packet belongs to.

use super::Window;
use crate::error::ConfigError;
use crate::packet::PacketRecord;
use chrono::{DateTime, TimeDelta, Utc};
use std::mem;
use std::time::Duration;

/// Default cap on packets held for later windows.
pub const DEFAULT_DEFERRED_LIMIT: usize = 10_000;

/// A wall clock further than this from the current window start is treated
/// as a clock step, never less than [`MIN_SKEW_TOLERANCE_SECS`].
const SKEW_TOLERANCE_WINDOWS: i32 = 2;
const MIN_SKEW_TOLERANCE_SECS: i64 = 5;

/// Where an ingested packet went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Current,
    /// Timestamp at or past the current window end; held for a later window.
    Deferred,
    /// Timestamp before the current window start; its window is gone.
    Late,
    /// Belongs to a later window but the deferred buffer is full; discarded.
    Overflow,
}

pub struct WindowAggregator {
    size: TimeDelta,
    index: u64,
    start: DateTime<Utc>,
    buffer: Vec<PacketRecord>,
    deferred: Vec<PacketRecord>,
    deferred_limit: usize,
    late: u64,
    overflow: u64,
}

impl WindowAggregator {
    pub fn new(start: DateTime<Utc>, size: Duration) -> Result<Self, ConfigError> {
        if size.is_zero() {
            return Err(ConfigError::Invalid("window size must be positive".into()));
        }
        let size = TimeDelta::from_std(size)
            .map_err(|_| ConfigError::Invalid("window size out of range".into()))?;
        Ok(Self {
            size,
            index: 0,
            start,
            buffer: Vec::new(),
            deferred: Vec::new(),
            deferred_limit: DEFAULT_DEFERRED_LIMIT,
            late: 0,
            overflow: 0,
        })
    }

    pub fn with_deferred_limit(mut self, limit: usize) -> Self {
        self.deferred_limit = limit;
        self
    }

    pub fn ingest(&mut self, packet: PacketRecord) -> Placement {
        if packet.timestamp < self.start {
            self.late += 1;
            Placement::Late
        } else if packet.timestamp >= self.end() {
            if self.deferred.len() >= self.deferred_limit {
                self.overflow += 1;
                return Placement::Overflow;
            }
            self.deferred.push(packet);
            Placement::Deferred
        } else {
            self.buffer.push(packet);
            Placement::Current
        }
    }

    /// Hands off the current window and opens the next one at its end time.
    pub fn flush(&mut self) -> Window {
        let end = self.end();
        let window = Window {
            index: self.index,
            start: self.start,
            end,
            packets: mem::take(&mut self.buffer),
        };
        self.index += 1;
        self.start = end;

        let next_end = self.end();
        for p in mem::take(&mut self.deferred) {
            if p.timestamp < next_end {
                self.buffer.push(p);
            } else {
                self.deferred.push(p);
            }
        }
        window
    }

    /// Re-anchors the current window at `now` when the wall clock has moved
    /// outside the skew tolerance around it, and re-places buffered packets
    /// against the new bounds. Returns the jump applied to the window start.
    pub fn realign(&mut self, now: DateTime<Utc>) -> Option<TimeDelta> {
        let tolerance = (self.size * SKEW_TOLERANCE_WINDOWS)
            .max(TimeDelta::seconds(MIN_SKEW_TOLERANCE_SECS));
        if now >= self.start - tolerance && now < self.end() + tolerance {
            return None;
        }
        let jump = now - self.start;
        self.start = now;
        let held = mem::take(&mut self.buffer)
            .into_iter()
            .chain(mem::take(&mut self.deferred));
        for p in held {
            self.ingest(p);
        }
        Some(jump)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.size
    }

    /// Packets held for the current and later windows.
    pub fn buffered(&self) -> usize {
        self.buffer.len() + self.deferred.len()
    }

    pub fn late_packets(&self) -> u64 {
        self.late
    }

    /// Packets turned away by a full deferred buffer.
    pub fn overflowed(&self) -> u64 {
        self.overflow
    }
}
