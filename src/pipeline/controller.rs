use super::queue::{self, PacketReceiver, QueueMetrics};
use super::{CancellationToken, PipelineState};
use crate::capture::{run_producer, CaptureSource};
use crate::classifier::{Classifier, Prediction};
use crate::config::{AnalyzerConfig, WindowConfig};
use crate::error::{CaptureError, PersistenceError, PipelineError};
use crate::features::{extract, schema, FEATURE_COUNT};
use crate::packet::{PacketRecord, RawPacketRecord};
use crate::stats::{LiveStatus, StatsRecorder, StatsSnapshot};
use crate::storage::{self, OutputSink};
use crate::window::{Placement, Window, WindowAggregator};
use chrono::Utc;
use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const JOIN_POLL: Duration = Duration::from_millis(5);

/// Drives windows from capture to sink. Single use: `run` once, then read
/// the returned snapshot.
pub struct Pipeline {
    window: WindowConfig,
    classifier: Classifier,
    sink: Box<dyn OutputSink>,
    stats: StatsRecorder,
    cancel: CancellationToken,
    state: Arc<Mutex<PipelineState>>,
}

/// Cloneable control surface, usable from signal handlers and other threads.
#[derive(Clone)]
pub struct PipelineHandle {
    cancel: CancellationToken,
    state: Arc<Mutex<PipelineState>>,
}

impl PipelineHandle {
    /// Requests a drain. Returns immediately; the controller finishes the
    /// in-flight window and stops within one queue wait.
    pub fn stop(&self) {
        self.cancel.cancel();
        let mut state = self.state.lock();
        if *state == PipelineState::Running {
            *state = PipelineState::Draining;
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Counters owned outside the recorder, sampled just before a snapshot.
struct Observed {
    running: bool,
    buffer_size: usize,
    late_packets: u64,
    blocked_sends: u64,
    queue_dropped: u64,
}

impl Observed {
    fn sample(running: bool, agg: &WindowAggregator, queued: usize, metrics: &QueueMetrics) -> Self {
        Self {
            running,
            buffer_size: agg.buffered() + queued,
            late_packets: agg.late_packets(),
            blocked_sends: metrics.blocked_sends(),
            queue_dropped: metrics.dropped(),
        }
    }
}

fn retry_once<T>(mut op: impl FnMut() -> Result<T, PersistenceError>) -> Result<T, PersistenceError> {
    match op() {
        Ok(v) => Ok(v),
        Err(e) => {
            debug!(error = %e, "sink write failed; retrying once");
            op()
        }
    }
}

impl Pipeline {
    pub fn new(
        window: WindowConfig,
        classifier: Classifier,
        sink: Box<dyn OutputSink>,
    ) -> Result<Self, PipelineError> {
        window.validate()?;
        let stats = StatsRecorder::new(window.window_secs, classifier.info());
        Ok(Self {
            window,
            classifier,
            sink,
            stats,
            cancel: CancellationToken::new(),
            state: Arc::new(Mutex::new(PipelineState::Idle)),
        })
    }

    /// Validates `config` and loads the classifier it names. A configured
    /// model that cannot be loaded fails here, before any packet is read.
    pub fn from_config(
        config: &AnalyzerConfig,
        sink: Box<dyn OutputSink>,
    ) -> Result<Self, PipelineError> {
        let classifier = load_classifier(config)?;
        Self::new(config.window.clone(), classifier, sink)
    }

    /// Like [`Pipeline::from_config`], but opens the sink `config.output`
    /// names, and only once the classifier has loaded.
    pub fn open(config: &AnalyzerConfig) -> Result<Self, PipelineError> {
        let classifier = load_classifier(config)?;
        let sink = storage::open_sink(&config.output)?;
        Self::new(config.window.clone(), classifier, sink)
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            cancel: self.cancel.clone(),
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(LiveStatus {
            running: self.state() == PipelineState::Running,
            buffer_size: 0,
        })
    }

    fn set_state(&self, next: PipelineState) {
        *self.state.lock() = next;
    }

    fn abort_start(&self, e: PipelineError) -> PipelineError {
        self.set_state(PipelineState::Stopped);
        e
    }

    /// Runs until a stop request or until `source` is exhausted, then drains
    /// and returns the final snapshot. A capture failure still drains and
    /// writes final stats before it is returned.
    pub fn run(&mut self, source: Box<dyn CaptureSource>) -> Result<StatsSnapshot, PipelineError> {
        {
            let mut state = self.state.lock();
            if *state != PipelineState::Idle {
                return Err(PipelineError::AlreadyStarted);
            }
            *state = PipelineState::Running;
        }

        let size = self.window.window_size();
        let wait = self.window.queue_wait();
        let mut agg = WindowAggregator::new(Utc::now(), size)
            .map_err(|e| self.abort_start(e.into()))?
            .with_deferred_limit(self.window.queue_capacity);
        let mut deadline = Instant::now() + size;
        let (tx, rx) = queue::bounded(self.window.queue_capacity, wait, self.cancel.clone());
        let metrics = rx.metrics();

        let source_name = source.name().to_string();
        let producer_cancel = self.cancel.clone();
        let producer = thread::Builder::new()
            .name("capture".into())
            .spawn(move || run_producer(source, tx, producer_cancel))
            .map_err(|e| self.abort_start(CaptureError::Io(e).into()))?;

        info!(
            source = %source_name,
            window_secs = self.window.window_secs,
            queue_capacity = self.window.queue_capacity,
            "pipeline running"
        );

        loop {
            if self.cancel.is_cancelled() {
                info!("stop requested; draining");
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                self.drain_ready(&rx, &mut agg);
                let window = agg.flush();
                let overflowed = agg.overflowed();
                if let Some(jump) = agg.realign(Utc::now()) {
                    self.stats.note_dropped_packets(agg.overflowed() - overflowed);
                    warn!(
                        jump_ms = jump.num_milliseconds(),
                        window = agg.index(),
                        "wall clock stepped; window re-anchored"
                    );
                }
                let observed = Observed::sample(true, &agg, rx.len(), &metrics);
                self.process_window(window, observed);
                deadline += size;
                continue;
            }
            match rx.recv_timeout((deadline - now).min(wait)) {
                Ok(raw) => self.ingest(&mut agg, raw),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("capture stream ended; draining");
                    break;
                }
            }
        }

        self.set_state(PipelineState::Draining);
        self.cancel.cancel();
        self.drain_ready(&rx, &mut agg);
        // Flush the partial window, and any later window that has already
        // begun and holds deferred packets. Empty windows are only emitted
        // when a non-empty one follows them.
        loop {
            let partial = agg.flush();
            let more = agg.buffered() > 0 && agg.start() <= Utc::now();
            if more || !partial.is_empty() {
                let observed = Observed::sample(false, &agg, rx.len(), &metrics);
                self.process_window(partial, observed);
            }
            if !more {
                break;
            }
        }
        let leftover = agg.buffered();
        if leftover > 0 {
            warn!(packets = leftover, "discarding packets stamped past the final window");
            self.stats.note_dropped_packets(leftover as u64);
        }
        let capture_result = join_bounded(producer, wait);
        // Records that slipped in after the final drain never reach a window.
        let stranded = std::iter::from_fn(|| rx.try_recv().ok()).count();
        if stranded > 0 {
            debug!(packets = stranded, "discarding records queued during shutdown");
            self.stats.note_dropped_packets(stranded as u64);
        }
        drop(rx);

        self.set_state(PipelineState::Stopped);
        self.stats.observe(agg.late_packets(), metrics.blocked_sends(), metrics.dropped());
        let snapshot = self.stats.snapshot(LiveStatus {
            running: false,
            buffer_size: 0,
        });
        if let Err(e) = retry_once(|| self.sink.write_stats(&snapshot)) {
            warn!(error = %e, "final stats write failed");
        }
        info!(
            windows = snapshot.windows_processed,
            packets = snapshot.total_packets,
            threats = snapshot.threat_count,
            "pipeline stopped"
        );

        match capture_result {
            Some(Err(e)) => Err(e.into()),
            _ => Ok(snapshot),
        }
    }

    /// Moves everything already queued into the aggregator without waiting.
    fn drain_ready(&mut self, rx: &PacketReceiver, agg: &mut WindowAggregator) {
        for _ in 0..rx.len() {
            match rx.try_recv() {
                Ok(raw) => self.ingest(agg, raw),
                Err(_) => break,
            }
        }
    }

    fn ingest(&mut self, agg: &mut WindowAggregator, raw: RawPacketRecord) {
        match PacketRecord::try_from(raw) {
            Ok(packet) => match agg.ingest(packet) {
                Placement::Late => debug!(window = agg.index(), "late packet discarded"),
                Placement::Overflow => {
                    debug!(window = agg.index(), "deferred buffer full; packet dropped");
                    self.stats.note_dropped_packet();
                }
                Placement::Current | Placement::Deferred => {}
            },
            Err(e) => {
                debug!(error = %e, "dropping malformed packet");
                self.stats.note_dropped_packet();
            }
        }
    }

    fn process_window(&mut self, window: Window, observed: Observed) {
        let features = extract(&window.packets);
        let prediction = match self.classifier.predict(&features) {
            Ok(verdict) => Prediction::new(&window, features, verdict),
            Err(e) => {
                warn!(window = window.index, error = %e, "classification failed; window skipped");
                Prediction::degraded(&window, features)
            }
        };
        self.stats.record(&prediction, window.len());

        if prediction.is_threat {
            warn!(
                window = window.index,
                packets = window.len(),
                threat = %prediction.threat_type,
                confidence = prediction.confidence,
                "threat detected"
            );
        } else {
            debug!(
                window = window.index,
                packets = window.len(),
                confidence = prediction.confidence,
                "window normal"
            );
        }

        let sink = &mut self.sink;
        if let Err(e) = retry_once(|| sink.append_prediction(&prediction)) {
            warn!(window = window.index, error = %e, "prediction not persisted");
            self.stats.note_persistence_failure();
        }

        self.stats.observe(
            observed.late_packets,
            observed.blocked_sends,
            observed.queue_dropped,
        );
        let snapshot = self.stats.snapshot(LiveStatus {
            running: observed.running,
            buffer_size: observed.buffer_size,
        });
        let sink = &mut self.sink;
        if let Err(e) = retry_once(|| sink.write_stats(&snapshot)) {
            warn!(window = window.index, error = %e, "stats not persisted");
            self.stats.note_persistence_failure();
        }
    }
}

fn load_classifier(config: &AnalyzerConfig) -> Result<Classifier, PipelineError> {
    config.validate()?;
    info!(
        features = FEATURE_COUNT,
        schema_version = schema::SCHEMA_VERSION,
        schema_sha256 = %schema::schema_hash(),
        "feature schema"
    );
    Ok(Classifier::from_config(config.model_path.as_deref(), &config.rules)?)
}

/// Joins the producer if it finishes within `wait`; otherwise leaves it
/// detached. It exits on its own once it sees the closed queue or the stop flag.
fn join_bounded(
    producer: JoinHandle<Result<u64, CaptureError>>,
    wait: Duration,
) -> Option<Result<u64, CaptureError>> {
    let give_up = Instant::now() + wait;
    while !producer.is_finished() {
        if Instant::now() >= give_up {
            warn!("capture thread still busy; detaching");
            return None;
        }
        thread::sleep(JOIN_POLL);
    }
    match producer.join() {
        Ok(Ok(sent)) => {
            debug!(sent, "capture thread joined");
            Some(Ok(sent))
        }
        Ok(Err(e)) => Some(Err(e)),
        Err(_) => Some(Err(CaptureError::Panicked)),
    }
}
