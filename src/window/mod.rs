//! Fixed-duration, contiguous packet windows.

mod aggregator;

pub use aggregator::{Placement, WindowAggregator};

use crate::packet::PacketRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed window. Packets are in arrival order and all fall in `[start, end)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    pub index: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub packets: Vec<PacketRecord>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}
