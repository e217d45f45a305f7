//! Run-wide counters. Owned by the controller, updated once per completed
//! window; snapshots are independent copies.

use crate::classifier::{ClassifierInfo, Prediction, ThreatType};
use crate::features::Feature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub running: bool,
    pub window_secs: f64,
    /// Packets held by the aggregator plus records waiting in the queue
    pub buffer_size: usize,
    pub windows_processed: u64,
    pub total_predictions: u64,
    pub total_packets: u64,
    pub normal_count: u64,
    pub threat_count: u64,
    pub threat_counts: BTreeMap<ThreatType, u64>,
    pub mean_packet_size: f64,
    pub min_packet_size: u32,
    pub max_packet_size: u32,
    pub skipped_windows: u64,
    pub dropped_packets: u64,
    pub late_packets: u64,
    pub backpressure_waits: u64,
    pub queue_dropped: u64,
    pub persistence_failures: u64,
    pub classifier: ClassifierInfo,
}

/// Values observed from outside the recorder at snapshot time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveStatus {
    pub running: bool,
    pub buffer_size: usize,
}

pub struct StatsRecorder {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    window_secs: f64,
    classifier: ClassifierInfo,

    windows_processed: u64,
    total_packets: u64,
    normal_count: u64,
    threat_count: u64,
    threat_counts: BTreeMap<ThreatType, u64>,
    total_bytes: u64,
    min_packet_size: Option<u32>,
    max_packet_size: u32,
    skipped_windows: u64,
    dropped_packets: u64,
    late_packets: u64,
    backpressure_waits: u64,
    queue_dropped: u64,
    persistence_failures: u64,
}

impl StatsRecorder {
    pub fn new(window_secs: f64, classifier: ClassifierInfo) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            window_secs,
            classifier,
            windows_processed: 0,
            total_packets: 0,
            normal_count: 0,
            threat_count: 0,
            threat_counts: BTreeMap::new(),
            total_bytes: 0,
            min_packet_size: None,
            max_packet_size: 0,
            skipped_windows: 0,
            dropped_packets: 0,
            late_packets: 0,
            backpressure_waits: 0,
            queue_dropped: 0,
            persistence_failures: 0,
        }
    }

    /// Accounts for one completed window.
    pub fn record(&mut self, prediction: &Prediction, packet_count: usize) {
        self.windows_processed += 1;
        self.total_packets += packet_count as u64;
        if prediction.is_threat {
            self.threat_count += 1;
        } else {
            self.normal_count += 1;
        }
        *self.threat_counts.entry(prediction.threat_type).or_insert(0) += 1;
        if prediction.degraded {
            self.skipped_windows += 1;
        }

        if packet_count > 0 {
            let f = &prediction.features;
            self.total_bytes += f.get(Feature::TotalBytes) as u64;
            let min = f.get(Feature::MinPacketSize) as u32;
            self.min_packet_size = Some(self.min_packet_size.map_or(min, |m| m.min(min)));
            self.max_packet_size = self.max_packet_size.max(f.get(Feature::MaxPacketSize) as u32);
        }
    }

    pub fn note_dropped_packet(&mut self) {
        self.dropped_packets += 1;
    }

    pub fn note_dropped_packets(&mut self, n: u64) {
        self.dropped_packets += n;
    }

    pub fn note_persistence_failure(&mut self) {
        self.persistence_failures += 1;
    }

    /// Folds in counters maintained elsewhere (aggregator, queue). They are
    /// monotonic at the source; taking the max keeps them monotonic here.
    pub fn observe(&mut self, late_packets: u64, backpressure_waits: u64, queue_dropped: u64) {
        self.late_packets = self.late_packets.max(late_packets);
        self.backpressure_waits = self.backpressure_waits.max(backpressure_waits);
        self.queue_dropped = self.queue_dropped.max(queue_dropped);
    }

    pub fn windows_processed(&self) -> u64 {
        self.windows_processed
    }

    pub fn snapshot(&self, live: LiveStatus) -> StatsSnapshot {
        let mean_packet_size = if self.total_packets == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.total_packets as f64
        };
        StatsSnapshot {
            run_id: self.run_id,
            started_at: self.started_at,
            updated_at: Utc::now(),
            running: live.running,
            window_secs: self.window_secs,
            buffer_size: live.buffer_size,
            windows_processed: self.windows_processed,
            total_predictions: self.windows_processed,
            total_packets: self.total_packets,
            normal_count: self.normal_count,
            threat_count: self.threat_count,
            threat_counts: self.threat_counts.clone(),
            mean_packet_size,
            min_packet_size: self.min_packet_size.unwrap_or(0),
            max_packet_size: self.max_packet_size,
            skipped_windows: self.skipped_windows,
            dropped_packets: self.dropped_packets,
            late_packets: self.late_packets,
            backpressure_waits: self.backpressure_waits,
            queue_dropped: self.queue_dropped,
            persistence_failures: self.persistence_failures,
            classifier: self.classifier.clone(),
        }
    }
}
