//! Synthetic traffic over a small fixed host set, for demos and soak runs
//! without capture privileges.

use super::CaptureSource;
use crate::error::CaptureError;
use crate::packet::{PacketRecord, Protocol, RawPacketRecord};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

const HOSTS: [Ipv4Addr; 8] = [
    Ipv4Addr::new(192, 168, 1, 100),
    Ipv4Addr::new(192, 168, 1, 101),
    Ipv4Addr::new(192, 168, 1, 102),
    Ipv4Addr::new(8, 8, 8, 8),
    Ipv4Addr::new(1, 1, 1, 1),
    Ipv4Addr::new(104, 244, 42, 129),
    Ipv4Addr::new(151, 101, 1, 140),
    Ipv4Addr::new(142, 250, 185, 206),
];
const SERVICE_PORTS: [u16; 5] = [80, 443, 22, 3389, 8080];
const SCAN_PORTS: u16 = 60;
// Enough on its own to push a default 5 s window past the DDoS rate floor.
const FLOOD_PACKETS: usize = 6_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Burst {
    PortScan,
    Flood,
}

pub struct SimulatedSource {
    rng: StdRng,
    interval: Duration,
    attack_ratio: f64,
    rate: u32,
    next_due: Instant,
    emitted: u64,
    pending: VecDeque<PacketRecord>,
}

impl SimulatedSource {
    /// `rate` packets per second of background traffic; once per simulated
    /// second a burst is injected with probability `attack_ratio`.
    pub fn new(rate: u32, attack_ratio: f64, seed: Option<u64>) -> Self {
        let rate = rate.max(1);
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            interval: Duration::from_secs_f64(1.0 / f64::from(rate)),
            attack_ratio: attack_ratio.clamp(0.0, 1.0),
            rate,
            next_due: Instant::now(),
            emitted: 0,
            pending: VecDeque::new(),
        }
    }

    fn host(&mut self) -> IpAddr {
        IpAddr::V4(*HOSTS.choose(&mut self.rng).unwrap_or(&HOSTS[0]))
    }

    fn background(&mut self) -> PacketRecord {
        let protocol = match self.rng.gen_range(0..10) {
            0..=6 => Protocol::Tcp,
            7..=8 => Protocol::Udp,
            _ => Protocol::Icmp,
        };
        let (src_port, dst_port) = if protocol == Protocol::Icmp {
            (0, 0)
        } else {
            (
                self.rng.gen_range(1024..=65535),
                *SERVICE_PORTS.choose(&mut self.rng).unwrap_or(&443),
            )
        };
        let flags = if protocol == Protocol::Tcp {
            ["A", "PA", "S", "SA", "FA"][self.rng.gen_range(0..5)].to_string()
        } else {
            String::new()
        };
        PacketRecord {
            timestamp: Utc::now(),
            src_ip: self.host(),
            dst_ip: self.host(),
            protocol,
            src_port,
            dst_port,
            size: self.rng.gen_range(64..=1500),
            ttl: *[64u8, 128, 255].choose(&mut self.rng).unwrap_or(&64),
            flags,
        }
    }

    fn inject(&mut self, burst: Burst) {
        let attacker = IpAddr::V4(Ipv4Addr::new(10, 0, 0, self.rng.gen_range(2..250)));
        let target = self.host();
        let now = Utc::now();
        match burst {
            Burst::PortScan => {
                let first = self.rng.gen_range(1..=1000u16);
                for offset in 0..SCAN_PORTS {
                    self.pending.push_back(PacketRecord {
                        timestamp: now,
                        src_ip: attacker,
                        dst_ip: target,
                        protocol: Protocol::Tcp,
                        src_port: 40000 + offset,
                        dst_port: first + offset,
                        size: 60,
                        ttl: 64,
                        flags: "S".into(),
                    });
                }
            }
            Burst::Flood => {
                for _ in 0..FLOOD_PACKETS {
                    let src_port = self.rng.gen_range(1024..=65535);
                    self.pending.push_back(PacketRecord {
                        timestamp: now,
                        src_ip: attacker,
                        dst_ip: target,
                        protocol: Protocol::Udp,
                        src_port,
                        dst_port: 80,
                        size: self.rng.gen_range(64..=512),
                        ttl: 64,
                        flags: String::new(),
                    });
                }
            }
        }
        tracing::debug!(?burst, %attacker, %target, "injected simulated burst");
    }
}

impl CaptureSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn next_record(&mut self) -> Result<Option<RawPacketRecord>, CaptureError> {
        if let Some(p) = self.pending.pop_front() {
            return Ok(Some(p.into()));
        }

        let now = Instant::now();
        if self.next_due > now {
            std::thread::sleep(self.next_due - now);
        }
        self.next_due += self.interval;
        // Do not try to catch up after a long stall.
        let now = Instant::now();
        if self.next_due + self.interval < now {
            self.next_due = now;
        }

        if self.emitted % u64::from(self.rate) == 0 && self.rng.gen_bool(self.attack_ratio) {
            let burst = if self.rng.gen_bool(0.5) {
                Burst::PortScan
            } else {
                Burst::Flood
            };
            self.inject(burst);
        }
        self.emitted += 1;
        Ok(Some(self.background().into()))
    }
}
