//! Output sinks: JSON files and SQLite.

use chrono::{TimeDelta, Utc};
use netguard_analyzer::classifier::{ClassifierInfo, Prediction, ThreatType, Verdict};
use netguard_analyzer::config::{OutputConfig, OutputFormat};
use netguard_analyzer::features::FeatureVector;
use netguard_analyzer::stats::{LiveStatus, StatsRecorder, StatsSnapshot};
use netguard_analyzer::storage::{open_sink, JsonFileSink, OutputSink, SqliteStore};
use netguard_analyzer::window::Window;
use std::fs;

fn prediction(index: u64, threat: ThreatType) -> Prediction {
    let start = Utc::now() + TimeDelta::seconds(5 * index as i64);
    let window = Window {
        index,
        start,
        end: start + TimeDelta::seconds(5),
        packets: Vec::new(),
    };
    Prediction::new(&window, FeatureVector::zeros(), Verdict::new(threat, 0.75))
}

fn snapshot(windows: u64) -> StatsSnapshot {
    let mut rec = StatsRecorder::new(
        5.0,
        ClassifierInfo {
            kind: "rule_based".into(),
            model_path: None,
            model_sha256: None,
        },
    );
    for i in 0..windows {
        let threat = if i % 2 == 0 { ThreatType::Normal } else { ThreatType::PortScan };
        rec.record(&prediction(i, threat), 0);
    }
    rec.snapshot(LiveStatus {
        running: true,
        buffer_size: 3,
    })
}

#[test]
fn sqlite_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SqliteStore::open(&dir.path().join("netguard.db")).unwrap();
    assert!(store.latest_stats().unwrap().is_none());

    for i in 0..3 {
        store.append_prediction(&prediction(i, ThreatType::DdosAttack)).unwrap();
    }
    let recent = store.recent_predictions(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].window_index, 2);
    assert_eq!(recent[1].window_index, 1);
    assert_eq!(recent[0].threat_type, ThreatType::DdosAttack);
    assert!(recent[0].is_threat);

    store.write_stats(&snapshot(1)).unwrap();
    store.write_stats(&snapshot(4)).unwrap();
    let latest = store.latest_stats().unwrap().unwrap();
    assert_eq!(latest.windows_processed, 4);
    assert_eq!(latest.threat_counts.get(&ThreatType::PortScan), Some(&2));
    assert_eq!(latest.buffer_size, 3);
}

#[test]
fn json_sink_appends_and_replaces() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut sink = JsonFileSink::open(dir.path()).unwrap();
        sink.append_prediction(&prediction(0, ThreatType::Normal)).unwrap();
        sink.append_prediction(&prediction(1, ThreatType::MalwareDetected)).unwrap();
        sink.write_stats(&snapshot(1)).unwrap();
        sink.write_stats(&snapshot(2)).unwrap();
    }
    // reopening appends rather than truncating
    let mut sink = JsonFileSink::open(dir.path()).unwrap();
    sink.append_prediction(&prediction(2, ThreatType::Normal)).unwrap();

    let lines = fs::read_to_string(dir.path().join("predictions.ndjson")).unwrap();
    let parsed: Vec<Prediction> = lines
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(parsed.len(), 3);
    assert_eq!(parsed[1].threat_type, ThreatType::MalwareDetected);
    assert_eq!(
        parsed.iter().map(|p| p.window_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    let stats: StatsSnapshot =
        serde_json::from_slice(&fs::read(dir.path().join("stats.json")).unwrap()).unwrap();
    assert_eq!(stats.windows_processed, 2);
    assert!(!dir.path().join("stats.json.tmp").exists());
}

#[test]
fn open_sink_creates_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested").join("out");
    let mut sink = open_sink(&OutputConfig {
        format: OutputFormat::Sqlite,
        dir: out.clone(),
    })
    .unwrap();
    sink.append_prediction(&prediction(0, ThreatType::Normal)).unwrap();
    assert!(out.join("netguard.db").exists());

    let mut sink = open_sink(&OutputConfig {
        format: OutputFormat::Json,
        dir: out.clone(),
    })
    .unwrap();
    sink.write_stats(&snapshot(0)).unwrap();
    assert!(out.join("stats.json").exists());
}
