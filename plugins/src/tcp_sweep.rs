//! Active TCP connect sweep of the local networks.
//!
//! Intrusive: it sends traffic to every address of every private network this
//! host sits on, so it only runs when the operator opts in. A host counts as
//! alive when any probed port either accepts or actively refuses the
//! connection; silence is indistinguishable from nothing being there.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pnet::datalink;
use pnet::ipnetwork::Ipv4Network;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use lookout_common::network::interface::sweepable_networks;
use lookout_common::network::range::host_range;
use lookout_common::{Category, DiscoveryError, Entity, FactRecord, Value};
use lookout_core::{Discoverer, Plugin, register_discoverer};

pub const DEFAULT_PORTS: [u16; 4] = [22, 80, 443, 445];
const CONNECT_TIMEOUT: Duration = Duration::from_millis(300);
const MAX_IN_FLIGHT: usize = 64;
/// Wider networks are cut down to the block around our own address.
const MIN_PREFIX: u8 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepTarget {
    pub interface: String,
    pub network: Ipv4Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortState {
    Open,
    Closed,
}

impl PortState {
    fn as_str(self) -> &'static str {
        match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
        }
    }
}

pub struct TcpSweep {
    ports: Vec<u16>,
    targets: Option<Vec<SweepTarget>>,
    connect_timeout: Duration,
}

impl TcpSweep {
    pub fn with_ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.ports = ports.into();
        self
    }

    /// Sweeps exactly `targets` instead of the networks of the local
    /// interfaces.
    pub fn with_targets(mut self, targets: Vec<SweepTarget>) -> Self {
        self.targets = Some(targets);
        self
    }

    pub fn with_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    fn targets(&self) -> Vec<SweepTarget> {
        if let Some(targets) = &self.targets {
            return targets.clone();
        }

        sweepable_networks(&datalink::interfaces())
            .into_iter()
            .map(|(interface, network)| SweepTarget { interface, network })
            .collect()
    }

    async fn sweep(&self, targets: &[SweepTarget]) -> BTreeMap<Ipv4Addr, (String, BTreeMap<u16, PortState>)> {
        let permits = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
        let mut probes = JoinSet::new();

        for target in targets {
            let range = host_range(target.network, MIN_PREFIX);
            debug!(interface = %target.interface, network = %target.network, hosts = range.len(), "sweeping");

            for host in range.to_iter() {
                for &port in &self.ports {
                    let permits = Arc::clone(&permits);
                    let interface = target.interface.clone();
                    let connect_timeout = self.connect_timeout;

                    probes.spawn(async move {
                        let _permit = permits.acquire_owned().await.ok()?;
                        let state = probe_port(SocketAddr::from((host, port)), connect_timeout).await?;
                        Some((host, interface, port, state))
                    });
                }
            }
        }

        let mut alive: BTreeMap<Ipv4Addr, (String, BTreeMap<u16, PortState>)> = BTreeMap::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(Some((host, interface, port, state))) => {
                    alive
                        .entry(host)
                        .or_insert_with(|| (interface, BTreeMap::new()))
                        .1
                        .insert(port, state);
                }
                Ok(None) => {}
                Err(e) => warn!("sweep probe task failed: {e}"),
            }
        }
        alive
    }
}

impl Default for TcpSweep {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            targets: None,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl Plugin for TcpSweep {
    const NAME: &'static str = "tcp-sweep";
    const INTRUSIVE: bool = true;
    const DESCRIPTION: &'static str = "TCP connect sweep of the local private networks";

    fn create() -> Result<Self, DiscoveryError> {
        Ok(Self::default())
    }
}

#[async_trait]
impl Discoverer for TcpSweep {
    async fn validate(&mut self) -> Result<(), DiscoveryError> {
        if self.ports.is_empty() {
            return Err(DiscoveryError::dependency("no ports to probe"));
        }
        if self.targets().is_empty() {
            return Err(DiscoveryError::dependency(
                "no up, non-loopback interface with a private IPv4 network",
            ));
        }
        Ok(())
    }

    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
        let targets = self.targets();
        if targets.is_empty() {
            return Err(DiscoveryError::probe("no sweepable network left"));
        }

        let alive = self.sweep(&targets).await;
        info!(hosts = alive.len(), "tcp sweep finished");

        if alive.is_empty() {
            return Ok(Vec::new());
        }

        let mut record = FactRecord::new();
        for (host, (interface, ports)) in alive {
            let ports: BTreeMap<String, Value> = ports
                .into_iter()
                .map(|(port, state)| (port.to_string(), Value::from(state.as_str())))
                .collect();

            record.push(
                Category::Devices,
                Entity::new()
                    .with("ipv4.address", host)
                    .with("if.name", interface)
                    .with("tcp.ports", ports)
                    .with("seen.via", Self::NAME),
            );
        }
        Ok(vec![record])
    }
}

register_discoverer!(TcpSweep);

/// `None` when nothing answered in time.
async fn probe_port(addr: SocketAddr, connect_timeout: Duration) -> Option<PortState> {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Some(PortState::Open),
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Some(PortState::Closed),
        Ok(Err(_)) | Err(_) => None,
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
