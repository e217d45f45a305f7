//! Window packets → feature vector. Pure: no clock, no randomness, and all
//! counting goes through ordered maps so float sums are order-stable.

use super::{Feature, FeatureVector};
use crate::packet::{PacketRecord, Protocol};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// Rates divide by at least this many seconds.
const MIN_DURATION_SECS: f64 = 0.001;

const HTTP_PORTS: &[u16] = &[80, 8080];
const HTTPS_PORT: u16 = 443;
const DNS_PORT: u16 = 53;
const SSH_PORT: u16 = 22;

/// Well-known backdoor / C2 listener ports.
pub const SUSPICIOUS_PORTS: &[u16] = &[
    1234,  // simple backdoor
    4444,  // metasploit default
    5555,
    6667,  // irc botnets
    9999,
    12345, // netbus
    31337, // back orifice
];

fn touches(p: &PacketRecord, port: u16) -> bool {
    p.src_port == port || p.dst_port == port
}

/// Base-2 Shannon entropy of a frequency distribution. Zero for empty or
/// single-valued distributions.
pub fn shannon_entropy<I>(counts: I) -> f64
where
    I: IntoIterator<Item = usize>,
{
    let counts: Vec<usize> = counts.into_iter().filter(|c| *c > 0).collect();
    if counts.len() <= 1 {
        return 0.0;
    }
    let total: usize = counts.iter().sum();
    let total = total as f64;
    counts
        .iter()
        .map(|c| {
            let p = *c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

fn frequencies(addrs: impl Iterator<Item = IpAddr>) -> BTreeMap<IpAddr, usize> {
    let mut map = BTreeMap::new();
    for a in addrs {
        *map.entry(a).or_insert(0) += 1;
    }
    map
}

/// Computes the feature vector for one window's packets, in arrival order.
pub fn extract(packets: &[PacketRecord]) -> FeatureVector {
    let mut fv = FeatureVector::zeros();
    if packets.is_empty() {
        return fv;
    }
    let n = packets.len() as f64;

    let total_bytes: u64 = packets.iter().map(|p| u64::from(p.size)).sum();
    let mean_size = total_bytes as f64 / n;
    let variance = packets
        .iter()
        .map(|p| {
            let d = f64::from(p.size) - mean_size;
            d * d
        })
        .sum::<f64>()
        / n;

    fv[Feature::TotalPackets] = n;
    fv[Feature::TotalBytes] = total_bytes as f64;
    fv[Feature::MeanPacketSize] = mean_size;
    fv[Feature::StdPacketSize] = variance.sqrt();
    fv[Feature::MinPacketSize] = packets.iter().map(|p| p.size).min().map_or(0.0, f64::from);
    fv[Feature::MaxPacketSize] = packets.iter().map(|p| p.size).max().map_or(0.0, f64::from);

    let src_freq = frequencies(packets.iter().map(|p| p.src_ip));
    let dst_freq = frequencies(packets.iter().map(|p| p.dst_ip));
    let src_ports: BTreeSet<u16> = packets.iter().map(|p| p.src_port).collect();
    let dst_ports: BTreeSet<u16> = packets.iter().map(|p| p.dst_port).collect();
    fv[Feature::UniqueSrcIps] = src_freq.len() as f64;
    fv[Feature::UniqueDstIps] = dst_freq.len() as f64;
    fv[Feature::UniqueSrcPorts] = src_ports.len() as f64;
    fv[Feature::UniqueDstPorts] = dst_ports.len() as f64;

    for p in packets {
        let slot = match p.protocol {
            Protocol::Tcp => Feature::TcpPackets,
            Protocol::Udp => Feature::UdpPackets,
            Protocol::Icmp => Feature::IcmpPackets,
            Protocol::Other(_) => Feature::OtherPackets,
        };
        fv[slot] += 1.0;

        if HTTP_PORTS.iter().any(|port| touches(p, *port)) {
            fv[Feature::HttpPackets] += 1.0;
        }
        if touches(p, HTTPS_PORT) {
            fv[Feature::HttpsPackets] += 1.0;
        }
        if touches(p, DNS_PORT) {
            fv[Feature::DnsPackets] += 1.0;
        }
        if touches(p, SSH_PORT) {
            fv[Feature::SshPackets] += 1.0;
        }
        if p.flags.contains('S') && !p.flags.contains('A') {
            fv[Feature::SynPackets] += 1.0;
        }
        if SUSPICIOUS_PORTS.contains(&p.dst_port) {
            fv[Feature::SuspiciousPortPackets] += 1.0;
        }
    }

    let ttl_sum: u64 = packets.iter().map(|p| u64::from(p.ttl)).sum();
    fv[Feature::MeanTtl] = ttl_sum as f64 / n;
    fv[Feature::MinTtl] = packets.iter().map(|p| p.ttl).min().map_or(0.0, f64::from);
    fv[Feature::MaxTtl] = packets.iter().map(|p| p.ttl).max().map_or(0.0, f64::from);

    let first = packets.iter().map(|p| p.timestamp).min();
    let last = packets.iter().map(|p| p.timestamp).max();
    let duration = match (first, last) {
        (Some(a), Some(b)) => (b - a)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0),
        _ => 0.0,
    };
    let denom = duration.max(MIN_DURATION_SECS);
    fv[Feature::Duration] = duration;
    fv[Feature::PacketsPerSecond] = n / denom;
    fv[Feature::BytesPerSecond] = total_bytes as f64 / denom;

    fv[Feature::SrcIpEntropy] = shannon_entropy(src_freq.values().copied());
    fv[Feature::DstIpEntropy] = shannon_entropy(dst_freq.values().copied());
    let top_src = src_freq.values().copied().max().unwrap_or(0);
    fv[Feature::TopSrcIpRatio] = top_src as f64 / n;

    fv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropy_of_uniform_distribution_is_log2_n() {
        let h = shannon_entropy(vec![3usize; 8]);
        assert!((h - 3.0).abs() < 1e-12);
    }

    #[test]
    fn entropy_degenerate_cases_are_zero() {
        assert_eq!(shannon_entropy(Vec::<usize>::new()), 0.0);
        assert_eq!(shannon_entropy(vec![42]), 0.0);
        assert_eq!(shannon_entropy(vec![0, 7, 0]), 0.0);
    }
}
