//! Analyzer configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Windowing and queue parameters
    pub window: WindowConfig,
    /// Trained classifier artifact; rule-based classification when unset
    pub model_path: Option<PathBuf>,
    /// Rule-based classifier thresholds
    pub rules: RuleConfig,
    /// Capture collaborator selection
    pub capture: CaptureConfig,
    /// Prediction and stats output
    pub output: OutputConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window length in seconds
    pub window_secs: f64,
    /// Bounded packet queue capacity
    pub queue_capacity: usize,
    /// Upper bound on any single queue wait (ms); also the cancellation latency
    pub queue_wait_ms: u64,
}

/// Thresholds for the ordered heuristic rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub port_scan_min_ports: u32,
    pub port_scan_min_packets: u32,
    pub ddos_min_pps: f64,
    pub ddos_min_packets: u32,
    /// Share of the window's packets sent by its busiest source.
    pub ddos_min_top_src_ratio: f64,
    pub malware_min_packets: u32,
    pub exfil_entropy_delta: f64,
    pub exfil_min_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Simulated,
    Replay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: SourceKind,
    /// Interface selector, passed through to the capture source untouched
    pub interface: Option<String>,
    /// NDJSON packet file for `replay`
    pub replay_path: Option<PathBuf>,
    /// Replay pacing in records per second; as fast as the queue allows when unset
    pub replay_rate: Option<u32>,
    /// Packets per second for `simulated`
    pub simulated_rate: u32,
    /// Fraction of simulated seconds that carry a burst (scan or flood)
    pub simulated_attack_ratio: f64,
    /// Fixed RNG seed for reproducible simulation
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            model_path: None,
            rules: RuleConfig::default(),
            capture: CaptureConfig::default(),
            output: OutputConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_secs: 5.0,
            queue_capacity: 10_000,
            queue_wait_ms: 250,
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            port_scan_min_ports: 20,
            port_scan_min_packets: 20,
            ddos_min_pps: 1000.0,
            ddos_min_packets: 500,
            ddos_min_top_src_ratio: 0.5,
            malware_min_packets: 5,
            exfil_entropy_delta: 2.5,
            exfil_min_bytes: 5_000_000,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Simulated,
            interface: None,
            replay_path: None,
            replay_rate: None,
            simulated_rate: 20,
            simulated_attack_ratio: 0.05,
            seed: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            dir: PathBuf::from("data"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl WindowConfig {
    /// Only meaningful once [`WindowConfig::validate`] has passed.
    pub fn window_size(&self) -> Duration {
        Duration::from_secs_f64(self.window_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "window_secs must be positive, got {}",
                self.window_secs
            )));
        }
        if self.window_secs > 86_400.0 {
            return Err(ConfigError::Invalid("window_secs must be at most one day".into()));
        }
        if self.window_size() < Duration::from_millis(1) {
            return Err(ConfigError::Invalid("window_secs must be at least 1 ms".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self.queue_wait_ms == 0 {
            return Err(ConfigError::Invalid("queue_wait_ms must be at least 1".into()));
        }
        Ok(())
    }

    pub fn queue_wait(&self) -> Duration {
        Duration::from_millis(self.queue_wait_ms)
    }
}

impl AnalyzerConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate()?;
        if self.capture.source == SourceKind::Replay && self.capture.replay_path.is_none() {
            return Err(ConfigError::Invalid("replay source needs replay_path".into()));
        }
        if self.capture.source == SourceKind::Simulated && self.capture.simulated_rate == 0 {
            return Err(ConfigError::Invalid("simulated_rate must be at least 1".into()));
        }
        if self.capture.replay_rate == Some(0) {
            return Err(ConfigError::Invalid("replay_rate must be at least 1 when set".into()));
        }
        if !(0.0..=1.0).contains(&self.rules.ddos_min_top_src_ratio) {
            return Err(ConfigError::Invalid(
                "ddos_min_top_src_ratio must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.capture.simulated_attack_ratio) {
            return Err(ConfigError::Invalid(
                "simulated_attack_ratio must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
