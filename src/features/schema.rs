//! Feature layout. Order here is the order fed to trained models; any change
//! must bump [`SCHEMA_VERSION`] and invalidates existing artifacts.

use sha2::{Digest, Sha256};

pub const SCHEMA_VERSION: u8 = 1;

macro_rules! feature_schema {
    ($($variant:ident => $name:literal,)+) => {
        /// One named column of a [`super::FeatureVector`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Feature {
            $($variant,)+
        }

        impl Feature {
            pub const ALL: &'static [Feature] = &[$(Feature::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Feature::$variant => $name,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Feature::$variant),)+
                    _ => None,
                }
            }
        }

        pub const FEATURE_NAMES: &[&str] = &[$($name,)+];
    };
}

feature_schema! {
    TotalPackets => "total_packets",
    TotalBytes => "total_bytes",
    MeanPacketSize => "mean_packet_size",
    StdPacketSize => "std_packet_size",
    MinPacketSize => "min_packet_size",
    MaxPacketSize => "max_packet_size",
    UniqueSrcIps => "unique_src_ips",
    UniqueDstIps => "unique_dst_ips",
    UniqueSrcPorts => "unique_src_ports",
    UniqueDstPorts => "unique_dst_ports",
    TcpPackets => "tcp_packets",
    UdpPackets => "udp_packets",
    IcmpPackets => "icmp_packets",
    OtherPackets => "other_packets",
    HttpPackets => "http_packets",
    HttpsPackets => "https_packets",
    DnsPackets => "dns_packets",
    SshPackets => "ssh_packets",
    MeanTtl => "mean_ttl",
    MinTtl => "min_ttl",
    MaxTtl => "max_ttl",
    Duration => "duration",
    PacketsPerSecond => "packets_per_second",
    BytesPerSecond => "bytes_per_second",
    SrcIpEntropy => "src_ip_entropy",
    DstIpEntropy => "dst_ip_entropy",
    TopSrcIpRatio => "top_src_ip_ratio",
    SynPackets => "syn_packets",
    SuspiciousPortPackets => "suspicious_port_packets",
}

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

impl Feature {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// SHA-256 over version and names in order, hex encoded.
pub fn schema_hash() -> String {
    let mut h = Sha256::new();
    h.update([SCHEMA_VERSION]);
    for name in FEATURE_NAMES {
        h.update(name.as_bytes());
        h.update([0u8]);
    }
    format!("{:x}", h.finalize())
}

/// Checks that `names` is exactly this schema, returning the first difference.
pub fn check_schema<S: AsRef<str>>(names: &[S]) -> Result<(), String> {
    if names.len() != FEATURE_COUNT {
        return Err(format!(
            "expected {} features, artifact declares {}",
            FEATURE_COUNT,
            names.len()
        ));
    }
    for (i, (ours, theirs)) in FEATURE_NAMES.iter().zip(names).enumerate() {
        if *ours != theirs.as_ref() {
            return Err(format!(
                "feature {} is `{}`, expected `{}`",
                i,
                theirs.as_ref(),
                ours
            ));
        }
    }
    Ok(())
}
