//! Feature extraction benchmark: one window of mixed traffic → feature vector.

use chrono::{TimeDelta, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use netguard_analyzer::features::extract;
use netguard_analyzer::packet::{PacketRecord, Protocol};
use std::net::{IpAddr, Ipv4Addr};

fn window(n: usize) -> Vec<PacketRecord> {
    let start = Utc::now();
    (0..n)
        .map(|i| PacketRecord {
            timestamp: start + TimeDelta::milliseconds(i as i64),
            src_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, (i % 50) as u8)),
            dst_ip: IpAddr::V4(Ipv4Addr::new(10, 0, (i % 7) as u8, 1)),
            protocol: if i % 5 == 0 { Protocol::Udp } else { Protocol::Tcp },
            src_port: 40000 + (i % 1000) as u16,
            dst_port: [80, 443, 22, 53, 4444][i % 5],
            size: 64 + (i % 1400) as u32,
            ttl: 64,
            flags: if i % 3 == 0 { "S".into() } else { "A".into() },
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let mut g = c.benchmark_group("extract_by_window_size");
    for n in [0usize, 100, 1_000, 10_000] {
        let packets = window(n);
        g.bench_with_input(BenchmarkId::from_parameter(n), &packets, |b, p| {
            b.iter(|| extract(black_box(p)))
        });
    }
    g.finish();
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
