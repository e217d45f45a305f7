#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use netguard_analyzer::classifier::Prediction;
use netguard_analyzer::error::PersistenceError;
use netguard_analyzer::packet::{PacketRecord, Protocol};
use netguard_analyzer::stats::StatsSnapshot;
use netguard_analyzer::storage::OutputSink;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

pub fn tcp(ts: DateTime<Utc>, src: &str, dst: &str, dst_port: u16) -> PacketRecord {
    PacketRecord {
        timestamp: ts,
        src_ip: ip(src),
        dst_ip: ip(dst),
        protocol: Protocol::Tcp,
        src_port: 50000,
        dst_port,
        size: 100,
        ttl: 64,
        flags: "A".into(),
    }
}

/// `n` packets from one source sweeping `ports` destination ports.
pub fn port_scan(start: DateTime<Utc>, n: usize, ports: u16) -> Vec<PacketRecord> {
    (0..n)
        .map(|i| {
            let mut p = tcp(
                start + TimeDelta::milliseconds(i as i64),
                "10.0.0.66",
                "192.168.1.10",
                1000 + (i as u16 % ports),
            );
            p.flags = "S".into();
            p.size = 60;
            p
        })
        .collect()
}

fn take_failure(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn injected() -> PersistenceError {
    PersistenceError::Io(std::io::Error::new(std::io::ErrorKind::Other, "injected failure"))
}

/// In-memory sink shared with the test through `Arc`s. The failure budgets
/// make the next N writes of each kind fail.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub predictions: Arc<Mutex<Vec<Prediction>>>,
    pub stats: Arc<Mutex<Vec<StatsSnapshot>>>,
    pub prediction_failures: Arc<AtomicUsize>,
    pub stats_failures: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn predictions(&self) -> Vec<Prediction> {
        self.predictions.lock().clone()
    }

    pub fn last_stats(&self) -> Option<StatsSnapshot> {
        self.stats.lock().last().cloned()
    }
}

impl OutputSink for MemorySink {
    fn append_prediction(&mut self, prediction: &Prediction) -> Result<(), PersistenceError> {
        if take_failure(&self.prediction_failures) {
            return Err(injected());
        }
        self.predictions.lock().push(prediction.clone());
        Ok(())
    }

    fn write_stats(&mut self, stats: &StatsSnapshot) -> Result<(), PersistenceError> {
        if take_failure(&self.stats_failures) {
            return Err(injected());
        }
        self.stats.lock().push(stats.clone());
        Ok(())
    }
}
