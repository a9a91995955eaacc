//! Passive discovery from the kernel's ARP cache.
//!
//! Reads `/proc/net/arp`, keeping only completed Ethernet entries. No traffic
//! is generated: the kernel already did the resolving.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use pnet::util::MacAddr;
use tracing::{debug, warn};

use lookout_common::{Category, DiscoveryError, Entity, FactRecord};
use lookout_core::{Discoverer, Plugin, register_discoverer};

use crate::table;

pub const ARP_TABLE: &str = "/proc/net/arp";

/// `ARPHRD_ETHER`
const HW_TYPE_ETHERNET: u32 = 0x1;
/// `ATF_COM`: the entry has been resolved.
const FLAG_COMPLETED: u32 = 0x2;

pub struct ArpDiscoverer {
    path: PathBuf,
}

impl ArpDiscoverer {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ArpDiscoverer {
    fn default() -> Self {
        Self::with_path(ARP_TABLE)
    }
}

impl Plugin for ArpDiscoverer {
    const NAME: &'static str = "arp";
    const PASSIVE: bool = true;
    const DESCRIPTION: &'static str = "neighbours from the kernel ARP cache";

    fn create() -> Result<Self, DiscoveryError> {
        Ok(Self::default())
    }
}

#[async_trait]
impl Discoverer for ArpDiscoverer {
    async fn validate(&mut self) -> Result<(), DiscoveryError> {
        table::ensure_readable(&self.path).await
    }

    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
        let contents = table::read(&self.path).await?;
        let devices = parse_arp_table(&contents);
        debug!(count = devices.len(), "arp cache read");

        if devices.is_empty() {
            return Ok(Vec::new());
        }

        let mut record = FactRecord::new();
        for device in devices {
            record.push(Category::Devices, device);
        }
        Ok(vec![record])
    }
}

register_discoverer!(ArpDiscoverer);

/// One device entity per completed Ethernet entry, in table order.
///
/// Malformed rows are logged and skipped.
pub fn parse_arp_table(contents: &str) -> Vec<Entity> {
    table::rows(contents)
        .filter_map(|tokens| match parse_row(&tokens) {
            Ok(entity) => entity,
            Err(reason) => {
                warn!(row = %tokens.join(" "), "skipping malformed arp row: {reason}");
                None
            }
        })
        .collect()
}

fn parse_row(tokens: &[&str]) -> Result<Option<Entity>, String> {
    let [ip, hw_type, flags, mac, _mask, device, ..] = tokens else {
        return Err(format!("expected 6 columns, got {}", tokens.len()));
    };

    let hw_type = table::hex(hw_type).ok_or_else(|| format!("bad hardware type {hw_type}"))?;
    let flags = table::hex(flags).ok_or_else(|| format!("bad flags {flags}"))?;

    if hw_type != HW_TYPE_ETHERNET || flags & FLAG_COMPLETED == 0 {
        return Ok(None);
    }

    let ip = Ipv4Addr::from_str(ip).map_err(|e| format!("bad address {ip}: {e}"))?;
    let mac = MacAddr::from_str(mac).map_err(|e| format!("bad hardware address {mac}: {e:?}"))?;

    Ok(Some(
        Entity::new()
            .with("ipv4.address", ip)
            .with("eth.address", mac)
            .with("if.name", *device),
    ))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
