//! Feature extraction: determinism, empty windows, entropy, counters.

mod common;

use chrono::{TimeDelta, Utc};
use common::{port_scan, tcp};
use netguard_analyzer::features::{extract, shannon_entropy, Feature, FeatureVector, FEATURE_NAMES};
use netguard_analyzer::packet::Protocol;

#[test]
fn extraction_is_deterministic() {
    let start = Utc::now();
    let mut packets = port_scan(start, 120, 30);
    packets.push(tcp(start, "192.168.1.2", "8.8.8.8", 53));
    let a = extract(&packets);
    let b = extract(&packets);
    assert_eq!(a, b);
    assert_eq!(a.as_slice(), b.as_slice());
}

#[test]
fn empty_window_is_all_zeros() {
    let fv = extract(&[]);
    assert_eq!(fv, FeatureVector::zeros());
    assert!(fv.as_slice().iter().all(|v| *v == 0.0));
}

#[test]
fn two_tcp_packets_same_pair() {
    let start = Utc::now();
    let packets = vec![
        tcp(start, "192.168.1.100", "8.8.8.8", 443),
        tcp(start + TimeDelta::milliseconds(500), "192.168.1.100", "8.8.8.8", 443),
    ];
    let fv = extract(&packets);
    assert_eq!(fv[Feature::TotalPackets], 2.0);
    assert_eq!(fv[Feature::TcpPackets], 2.0);
    assert_eq!(fv[Feature::UniqueSrcIps], 1.0);
    assert_eq!(fv[Feature::UniqueDstIps], 1.0);
    assert_eq!(fv[Feature::HttpsPackets], 2.0);
    assert_eq!(fv[Feature::SrcIpEntropy], 0.0);
    assert!((fv[Feature::Duration] - 0.5).abs() < 1e-9);
    assert!((fv[Feature::PacketsPerSecond] - 4.0).abs() < 1e-9);
    assert!((fv[Feature::BytesPerSecond] - 400.0).abs() < 1e-9);
}

#[test]
fn entropy_single_source_is_zero() {
    let start = Utc::now();
    let packets: Vec<_> = (0..10)
        .map(|i| tcp(start, "10.1.1.1", &format!("10.2.2.{}", i), 80))
        .collect();
    let fv = extract(&packets);
    assert_eq!(fv[Feature::SrcIpEntropy], 0.0);
    assert!((fv[Feature::DstIpEntropy] - 10f64.log2()).abs() < 1e-9);
    assert_eq!(fv[Feature::TopSrcIpRatio], 1.0);
}

#[test]
fn entropy_even_spread_is_log2_n() {
    for n in [2usize, 4, 7, 16] {
        assert!((shannon_entropy(vec![1; n]) - (n as f64).log2()).abs() < 1e-9);
    }
    assert_eq!(shannon_entropy(Vec::<usize>::new()), 0.0);
    assert_eq!(shannon_entropy(vec![5]), 0.0);
}

#[test]
fn size_statistics() {
    let start = Utc::now();
    let mut a = tcp(start, "10.0.0.1", "10.0.0.2", 80);
    a.size = 100;
    let mut b = a.clone();
    b.size = 300;
    let fv = extract(&[a, b]);
    assert_eq!(fv[Feature::TotalBytes], 400.0);
    assert_eq!(fv[Feature::MeanPacketSize], 200.0);
    assert_eq!(fv[Feature::StdPacketSize], 100.0);
    assert_eq!(fv[Feature::MinPacketSize], 100.0);
    assert_eq!(fv[Feature::MaxPacketSize], 300.0);
}

#[test]
fn protocol_service_and_flag_counters() {
    let start = Utc::now();
    let mut syn = tcp(start, "10.0.0.1", "10.0.0.2", 22);
    syn.flags = "S".into();
    let mut synack = tcp(start, "10.0.0.2", "10.0.0.1", 50000);
    synack.src_port = 22;
    synack.flags = "SA".into();
    let mut dns = tcp(start, "10.0.0.1", "10.0.0.53", 53);
    dns.protocol = Protocol::Udp;
    dns.flags.clear();
    let mut ping = tcp(start, "10.0.0.1", "10.0.0.2", 0);
    ping.protocol = Protocol::Icmp;
    ping.src_port = 0;
    ping.flags.clear();
    let mut gre = ping.clone();
    gre.protocol = Protocol::Other(47);
    let backdoor = tcp(start, "10.0.0.1", "10.0.0.9", 4444);

    let fv = extract(&[syn, synack, dns, ping, gre, backdoor]);
    assert_eq!(fv[Feature::TcpPackets], 3.0);
    assert_eq!(fv[Feature::UdpPackets], 1.0);
    assert_eq!(fv[Feature::IcmpPackets], 1.0);
    assert_eq!(fv[Feature::OtherPackets], 1.0);
    assert_eq!(fv[Feature::SshPackets], 2.0);
    assert_eq!(fv[Feature::DnsPackets], 1.0);
    assert_eq!(fv[Feature::SynPackets], 1.0);
    assert_eq!(fv[Feature::SuspiciousPortPackets], 1.0);
}

#[test]
fn feature_vector_serializes_in_schema_order() {
    let fv = extract(&port_scan(Utc::now(), 5, 5));
    let json = serde_json::to_string(&fv).unwrap();
    let mut last = 0;
    for name in FEATURE_NAMES {
        let at = json.find(&format!("\"{}\"", name)).unwrap();
        assert!(at >= last, "{} out of order", name);
        last = at;
    }
    let back: FeatureVector = serde_json::from_str(&json).unwrap();
    assert_eq!(back[Feature::TotalPackets], 5.0);
}
