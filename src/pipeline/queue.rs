//! Bounded packet queue between the capture thread and the controller.
//! A full queue blocks the producer; it never drops a record while the
//! consumer is alive. Every blocking episode is counted.

use super::CancellationToken;
use crate::packet::RawPacketRecord;
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Default)]
pub struct QueueMetrics {
    enqueued: AtomicU64,
    blocked_sends: AtomicU64,
    dropped: AtomicU64,
}

impl QueueMetrics {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Sends that found the queue full and had to wait.
    pub fn blocked_sends(&self) -> u64 {
        self.blocked_sends.load(Ordering::Relaxed)
    }

    /// Records discarded because the consumer went away or a stop was requested.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("packet queue closed")]
    Closed,
    #[error("stop requested while the queue was full")]
    Cancelled,
}

pub struct PacketSender {
    tx: Sender<RawPacketRecord>,
    metrics: Arc<QueueMetrics>,
    wait: Duration,
    cancel: CancellationToken,
}

pub struct PacketReceiver {
    rx: Receiver<RawPacketRecord>,
    metrics: Arc<QueueMetrics>,
}

/// Creates the queue. `wait` bounds each blocked send so a stop request is
/// noticed within one wait.
pub fn bounded(
    capacity: usize,
    wait: Duration,
    cancel: CancellationToken,
) -> (PacketSender, PacketReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let metrics = Arc::new(QueueMetrics::default());
    (
        PacketSender {
            tx,
            metrics: metrics.clone(),
            wait,
            cancel,
        },
        PacketReceiver { rx, metrics },
    )
}

impl PacketSender {
    /// Enqueues `record`, blocking while the queue is full.
    pub fn send(&self, record: RawPacketRecord) -> Result<(), SendError> {
        let mut record = match self.tx.try_send(record) {
            Ok(()) => {
                self.metrics.enqueued.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(TrySendError::Disconnected(_)) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(SendError::Closed);
            }
            Err(TrySendError::Full(r)) => {
                self.metrics.blocked_sends.fetch_add(1, Ordering::Relaxed);
                r
            }
        };

        loop {
            if self.cancel.is_cancelled() {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                return Err(SendError::Cancelled);
            }
            match self.tx.send_timeout(record, self.wait) {
                Ok(()) => {
                    self.metrics.enqueued.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(SendTimeoutError::Timeout(r)) => record = r,
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                    return Err(SendError::Closed);
                }
            }
        }
    }

    pub fn metrics(&self) -> Arc<QueueMetrics> {
        self.metrics.clone()
    }
}

impl PacketReceiver {
    pub fn recv_timeout(&self, timeout: Duration) -> Result<RawPacketRecord, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<RawPacketRecord, TryRecvError> {
        self.rx.try_recv()
    }

    /// Records currently waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn metrics(&self) -> Arc<QueueMetrics> {
        self.metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn record(i: u16) -> RawPacketRecord {
        RawPacketRecord {
            src_port: Some(i),
            ..Default::default()
        }
    }

    #[test]
    fn full_queue_blocks_producer_without_dropping() {
        let (tx, rx) = bounded(2, Duration::from_millis(10), CancellationToken::new());
        let metrics = rx.metrics();
        let producer = thread::spawn(move || {
            for i in 0..3 {
                tx.send(record(i)).unwrap();
            }
        });

        thread::sleep(Duration::from_millis(100));
        assert!(!producer.is_finished(), "third send should be blocked");
        assert_eq!(metrics.blocked_sends(), 1);

        let mut got = Vec::new();
        while got.len() < 3 {
            got.push(rx.recv_timeout(Duration::from_secs(1)).unwrap().src_port);
        }
        producer.join().unwrap();
        assert_eq!(got, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(metrics.enqueued(), 3);
        assert_eq!(metrics.dropped(), 0);
    }

    #[test]
    fn blocked_send_gives_up_on_cancel() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = bounded(1, Duration::from_millis(10), cancel.clone());
        tx.send(record(0)).unwrap();
        let producer = thread::spawn(move || tx.send(record(1)));
        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        assert_eq!(producer.join().unwrap(), Err(SendError::Cancelled));
    }

    #[test]
    fn send_after_receiver_dropped_is_closed() {
        let (tx, rx) = bounded(4, Duration::from_millis(10), CancellationToken::new());
        drop(rx);
        assert_eq!(tx.send(record(0)), Err(SendError::Closed));
        assert_eq!(tx.metrics().dropped(), 1);
    }
}
