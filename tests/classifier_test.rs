//! Rule-based classification scenarios and verdict laws.

mod common;

use chrono::{TimeDelta, Utc};
use common::{port_scan, tcp};
use netguard_analyzer::classifier::{
    Classifier, Condition, Measure, Prediction, Rule, RuleBasedClassifier, ThreatType, Verdict,
};
use netguard_analyzer::config::RuleConfig;
use netguard_analyzer::features::{extract, Feature, FeatureVector};
use netguard_analyzer::window::Window;

fn rules() -> RuleBasedClassifier {
    RuleBasedClassifier::new(&RuleConfig::default())
}

fn window_of(packets: Vec<netguard_analyzer::PacketRecord>) -> Window {
    let start = Utc::now() - TimeDelta::seconds(5);
    Window {
        index: 0,
        start,
        end: start + TimeDelta::seconds(5),
        packets,
    }
}

#[test]
fn two_packet_window_is_normal() {
    let start = Utc::now();
    let fv = extract(&[
        tcp(start, "192.168.1.100", "8.8.8.8", 443),
        tcp(start, "192.168.1.100", "8.8.8.8", 443),
    ]);
    let v = rules().predict(&fv);
    assert_eq!(v.threat_type, ThreatType::Normal);
    assert!(v.confidence > 0.0 && v.confidence <= 1.0);
}

#[test]
fn port_sweep_is_port_scan() {
    let fv = extract(&port_scan(Utc::now(), 200, 50));
    assert_eq!(fv[Feature::UniqueDstPorts], 50.0);
    let v = rules().predict(&fv);
    assert_eq!(v.threat_type, ThreatType::PortScan);
    assert!(v.confidence >= 0.5);
}

#[test]
fn single_source_flood_is_ddos() {
    let start = Utc::now();
    let packets: Vec<_> = (0..600)
        .map(|i| tcp(start + TimeDelta::microseconds(i * 800), "203.0.113.9", "192.168.1.10", 80))
        .collect();
    let fv = extract(&packets);
    assert!(fv[Feature::PacketsPerSecond] >= 1000.0);
    assert_eq!(rules().predict(&fv).threat_type, ThreatType::DdosAttack);
}

#[test]
fn many_sources_is_not_ddos() {
    let start = Utc::now();
    let packets: Vec<_> = (0..600)
        .map(|i| {
            tcp(
                start + TimeDelta::microseconds(i * 800),
                &format!("198.51.100.{}", i % 200),
                "192.168.1.10",
                80,
            )
        })
        .collect();
    assert_eq!(rules().predict(&extract(&packets)).threat_type, ThreatType::Normal);
}

#[test]
fn backdoor_port_traffic_is_malware() {
    let start = Utc::now();
    let packets: Vec<_> = (0..6)
        .map(|i| tcp(start + TimeDelta::milliseconds(i * 100), "192.168.1.7", "45.33.1.2", 4444))
        .collect();
    assert_eq!(rules().predict(&extract(&packets)).threat_type, ThreatType::MalwareDetected);
}

#[test]
fn entropy_asymmetry_with_volume_is_exfiltration() {
    let mut fv = FeatureVector::zeros();
    fv[Feature::TotalPackets] = 4000.0;
    fv[Feature::TotalBytes] = 6_000_000.0;
    fv[Feature::SrcIpEntropy] = 3.0;
    fv[Feature::DstIpEntropy] = 0.0;
    assert_eq!(rules().predict(&fv).threat_type, ThreatType::DataExfiltration);

    fv[Feature::TotalBytes] = 1_000_000.0;
    assert_eq!(rules().predict(&fv).threat_type, ThreatType::Normal);
}

#[test]
fn rules_are_evaluated_in_order() {
    // a sweep that also hits a backdoor port resolves as the earlier rule
    let mut packets = port_scan(Utc::now(), 100, 40);
    for p in packets.iter_mut().take(10) {
        p.dst_port = 31337;
    }
    assert_eq!(rules().predict(&extract(&packets)).threat_type, ThreatType::PortScan);
}

#[test]
fn match_at_threshold_has_half_confidence() {
    let mut fv = FeatureVector::zeros();
    fv[Feature::SuspiciousPortPackets] = 5.0;
    let v = rules().predict(&fv);
    assert_eq!(v.threat_type, ThreatType::MalwareDetected);
    assert!((v.confidence - 0.5).abs() < 1e-9);
}

#[test]
fn empty_window_is_confidently_normal() {
    let v = rules().predict(&FeatureVector::zeros());
    assert_eq!(v, Verdict::new(ThreatType::Normal, 1.0));
}

#[test]
fn near_miss_lowers_normal_confidence() {
    let mut fv = FeatureVector::zeros();
    fv[Feature::SuspiciousPortPackets] = 4.0;
    let v = rules().predict(&fv);
    assert_eq!(v.threat_type, ThreatType::Normal);
    assert!((v.confidence - 0.2).abs() < 1e-9);
}

#[test]
fn custom_thresholds_apply() {
    let config = RuleConfig {
        malware_min_packets: 1,
        ..RuleConfig::default()
    };
    let start = Utc::now();
    let fv = extract(&[tcp(start, "10.0.0.1", "10.0.0.2", 6667)]);
    assert_eq!(
        RuleBasedClassifier::new(&config).predict(&fv).threat_type,
        ThreatType::MalwareDetected
    );
    assert_eq!(rules().predict(&fv).threat_type, ThreatType::Normal);
}

#[test]
fn hand_built_rules() {
    let c = RuleBasedClassifier::with_rules(vec![Rule {
        threat: ThreatType::DdosAttack,
        conditions: vec![
            Condition::at_least(Measure::Feature(Feature::TotalPackets), 10.0),
            Condition::at_most(Measure::Feature(Feature::UniqueSrcIps), 3.0),
        ],
    }]);
    let mut fv = FeatureVector::zeros();
    fv[Feature::TotalPackets] = 20.0;
    let v = c.predict(&fv);
    assert_eq!(v.threat_type, ThreatType::DdosAttack);
    assert!((v.confidence - 0.75).abs() < 1e-9);
    assert_eq!(c.rules().len(), 1);
}

#[test]
fn predictions_are_consistent_and_bounded() {
    let classifier = Classifier::from_config(None, &RuleConfig::default()).unwrap();
    let start = Utc::now();
    let windows = vec![
        Vec::new(),
        vec![tcp(start, "10.0.0.1", "10.0.0.2", 80)],
        port_scan(start, 200, 50),
        port_scan(start, 30, 5),
        (0..8).map(|_| tcp(start, "10.0.0.1", "10.0.0.2", 12345)).collect(),
    ];
    for packets in windows {
        let window = window_of(packets);
        let features = extract(&window.packets);
        let p = Prediction::new(&window, features, classifier.predict(&features).unwrap());
        assert_eq!(p.is_threat, p.threat_type != ThreatType::Normal);
        assert!((0.0..=1.0).contains(&p.confidence));
        assert_eq!(p.packet_count, window.len());
    }
}

#[test]
fn degraded_prediction_is_normal_zero_confidence() {
    let window = window_of(port_scan(Utc::now(), 200, 50));
    let p = Prediction::degraded(&window, extract(&window.packets));
    assert_eq!(p.threat_type, ThreatType::Normal);
    assert!(!p.is_threat);
    assert_eq!(p.confidence, 0.0);
    assert!(p.degraded);
    assert!(serde_json::to_string(&p).unwrap().contains("\"degraded\":true"));
}

#[test]
fn verdict_confidence_is_clamped() {
    assert_eq!(Verdict::new(ThreatType::PortScan, 1.7).confidence, 1.0);
    assert_eq!(Verdict::new(ThreatType::PortScan, -0.2).confidence, 0.0);
    assert_eq!(Verdict::new(ThreatType::PortScan, f64::NAN).confidence, 0.0);
}

#[test]
fn threat_type_labels() {
    for t in ThreatType::ALL {
        assert_eq!(t.as_str().parse::<ThreatType>().unwrap(), *t);
        assert_eq!(serde_json::to_string(t).unwrap(), format!("\"{}\"", t));
    }
    assert!("botnet".parse::<ThreatType>().is_err());
    assert_eq!(
        Classifier::from_config(None, &RuleConfig::default()).unwrap().info().kind,
        "rule_based"
    );
}
