//! Multicast DNS announcement decoding.
//!
//! Only responses are interesting: they carry the name-to-address bindings
//! hosts announce about themselves. Queries are ignored.

use std::{collections::BTreeSet, net::IpAddr, net::Ipv4Addr};

use anyhow::{Context, Result};
use dns_parser::{Packet, RData};

pub const MDNS_PORT: u16 = 5353;
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MdnsRecord {
    pub hostname: Option<String>,
    pub ips: BTreeSet<IpAddr>,
}

impl MdnsRecord {
    pub fn is_empty(&self) -> bool {
        self.hostname.is_none() && self.ips.is_empty()
    }
}

/// Extracts the announced hostname and addresses from an mDNS packet.
///
/// Returns an empty record for queries.
pub fn extract_resource(data: &[u8]) -> Result<MdnsRecord> {
    let packet = Packet::parse(data).context("failed to parse mDNS packet")?;
    let mut metadata: MdnsRecord = MdnsRecord::default();

    if packet.header.query {
        return Ok(metadata);
    }

    for record in packet.answers.iter().chain(packet.additional.iter()) {
        match &record.data {
            RData::A(a) => {
                metadata.ips.insert(IpAddr::V4(a.0));
                metadata.hostname.get_or_insert_with(|| record.name.to_string());
            }

            RData::AAAA(aaaa) => {
                metadata.ips.insert(IpAddr::V6(aaaa.0));
                metadata.hostname.get_or_insert_with(|| record.name.to_string());
            }

            _ => {}
        }
    }

    Ok(metadata)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
