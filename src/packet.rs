//! Packet records as delivered by the capture collaborator.

use crate::error::MalformedPacket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// IP protocol number, with `Other` for anything not tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
    Other(u8),
}

impl Protocol {
    pub fn number(self) -> u8 {
        match self {
            Protocol::Icmp => 1,
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
            Protocol::Other(n) => n,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "TCP" => Some(Protocol::Tcp),
            "UDP" => Some(Protocol::Udp),
            "ICMP" => Some(Protocol::Icmp),
            other => other.parse::<u8>().ok().map(Protocol::from),
        }
    }
}

impl From<u8> for Protocol {
    fn from(n: u8) -> Self {
        match n {
            1 => Protocol::Icmp,
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            n => Protocol::Other(n),
        }
    }
}

impl From<Protocol> for u8 {
    fn from(p: Protocol) -> Self {
        p.number()
    }
}

/// A validated, immutable packet record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub timestamp: DateTime<Utc>,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub protocol: Protocol,
    pub src_port: u16,
    pub dst_port: u16,
    pub size: u32,
    pub ttl: u8,
    #[serde(default)]
    pub flags: String,
}

/// Either a protocol number or a name such as `"TCP"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProtocolField {
    Number(u8),
    Name(String),
}

/// Record as handed over by a capture source, before validation.
///
/// Ports default to 0 (ICMP carries none) and flags to empty; every other
/// field is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPacketRecord {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub src_ip: Option<String>,
    #[serde(default)]
    pub dst_ip: Option<String>,
    #[serde(default)]
    pub protocol: Option<ProtocolField>,
    #[serde(default)]
    pub src_port: Option<u16>,
    #[serde(default)]
    pub dst_port: Option<u16>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub ttl: Option<u8>,
    #[serde(default)]
    pub flags: Option<String>,
}

fn parse_addr(field: &'static str, value: Option<String>) -> Result<IpAddr, MalformedPacket> {
    let value = value.ok_or(MalformedPacket::MissingField(field))?;
    value
        .trim()
        .parse()
        .map_err(|_| MalformedPacket::InvalidAddress(value))
}

impl TryFrom<RawPacketRecord> for PacketRecord {
    type Error = MalformedPacket;

    fn try_from(raw: RawPacketRecord) -> Result<Self, Self::Error> {
        let timestamp = raw.timestamp.ok_or(MalformedPacket::MissingField("timestamp"))?;
        let src_ip = parse_addr("src_ip", raw.src_ip)?;
        let dst_ip = parse_addr("dst_ip", raw.dst_ip)?;
        let protocol = match raw.protocol {
            Some(ProtocolField::Number(n)) => Protocol::from(n),
            Some(ProtocolField::Name(name)) => match Protocol::from_name(&name) {
                Some(p) => p,
                None => return Err(MalformedPacket::InvalidProtocol(name)),
            },
            None => return Err(MalformedPacket::MissingField("protocol")),
        };
        let size = raw.size.ok_or(MalformedPacket::MissingField("size"))?;
        let ttl = raw.ttl.ok_or(MalformedPacket::MissingField("ttl"))?;

        Ok(PacketRecord {
            timestamp,
            src_ip,
            dst_ip,
            protocol,
            src_port: raw.src_port.unwrap_or(0),
            dst_port: raw.dst_port.unwrap_or(0),
            size,
            ttl,
            flags: raw.flags.unwrap_or_default(),
        })
    }
}

impl From<PacketRecord> for RawPacketRecord {
    fn from(p: PacketRecord) -> Self {
        Self {
            timestamp: Some(p.timestamp),
            src_ip: Some(p.src_ip.to_string()),
            dst_ip: Some(p.dst_ip.to_string()),
            protocol: Some(ProtocolField::Number(p.protocol.number())),
            src_port: Some(p.src_port),
            dst_port: Some(p.dst_port),
            size: Some(p.size),
            ttl: Some(p.ttl),
            flags: Some(p.flags),
        }
    }
}
