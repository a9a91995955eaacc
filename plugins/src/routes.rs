//! Passive discovery from the kernel's IPv4 routing table.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use lookout_common::{Category, DiscoveryError, Entity, FactRecord};
use lookout_core::{Discoverer, Plugin, register_discoverer};

use crate::table;

pub const ROUTE_TABLE: &str = "/proc/net/route";

const RTF_UP: u32 = 0x1;
const RTF_GATEWAY: u32 = 0x2;

pub struct RouteDiscoverer {
    path: PathBuf,
}

impl RouteDiscoverer {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for RouteDiscoverer {
    fn default() -> Self {
        Self::with_path(ROUTE_TABLE)
    }
}

impl Plugin for RouteDiscoverer {
    const NAME: &'static str = "routes";
    const PASSIVE: bool = true;
    const DESCRIPTION: &'static str = "networks and gateways from the kernel routing table";

    fn create() -> Result<Self, DiscoveryError> {
        Ok(Self::default())
    }
}

#[async_trait]
impl Discoverer for RouteDiscoverer {
    async fn validate(&mut self) -> Result<(), DiscoveryError> {
        table::ensure_readable(&self.path).await
    }

    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
        let contents = table::read(&self.path).await?;
        let routes = parse_route_table(&contents);
        debug!(count = routes.len(), "routing table read");

        if routes.is_empty() {
            return Ok(Vec::new());
        }

        let mut record = FactRecord::new();
        for route in routes {
            record.push(Category::Networks, route);
        }
        Ok(vec![record])
    }
}

register_discoverer!(RouteDiscoverer);

/// One network entity per route that is up, in table order.
pub fn parse_route_table(contents: &str) -> Vec<Entity> {
    table::rows(contents)
        .filter_map(|tokens| match parse_row(&tokens) {
            Ok(route) => route,
            Err(reason) => {
                warn!(row = %tokens.join(" "), "skipping malformed route row: {reason}");
                None
            }
        })
        .collect()
}

// Iface Destination Gateway Flags RefCnt Use Metric Mask MTU Window IRTT
fn parse_row(tokens: &[&str]) -> Result<Option<Entity>, String> {
    let [iface, destination, gateway, flags, _refcnt, _use, metric, mask, ..] = tokens else {
        return Err(format!("expected at least 8 columns, got {}", tokens.len()));
    };

    let flags = table::hex(flags).ok_or_else(|| format!("bad flags {flags}"))?;
    if flags & RTF_UP == 0 {
        return Ok(None);
    }

    let destination = address(destination)?;
    let gateway = address(gateway)?;
    let mask = address(mask)?;
    let metric: u32 = metric
        .parse()
        .map_err(|e| format!("bad metric {metric}: {e}"))?;

    let prefix = u32::from(mask).count_ones();
    let mut route = Entity::new()
        .with("ipv4.network", format!("{destination}/{prefix}"))
        .with("if.name", *iface)
        .with("route.metric", metric)
        .with("route.default", destination.is_unspecified() && prefix == 0);

    if flags & RTF_GATEWAY != 0 {
        route.set("route.gateway", gateway);
    }

    Ok(Some(route))
}

/// Addresses in `/proc/net/route` are hex dumps of the in-memory (network
/// order) value, printed as a host-order integer.
fn address(token: &str) -> Result<Ipv4Addr, String> {
    let raw = table::hex(token).ok_or_else(|| format!("bad address {token}"))?;
    Ok(Ipv4Addr::from(raw.to_ne_bytes()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
