//! Multicast DNS listener.
//!
//! Hosts announce their own names and addresses on the mDNS group; this
//! plugin just listens. It is push-based, so it replaces the polling loop with
//! its own receive loop.

use std::collections::{HashSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use lookout_common::{Category, DiscoveryError, Entity, FactRecord};
use lookout_core::{Discoverer, Plugin, RunContext, register_discoverer};
use lookout_protocols::mdns::{self, MDNS_GROUP_V4, MDNS_PORT, MdnsRecord};

/// Largest mDNS message a responder may send (RFC 6762, section 17).
const MAX_DATAGRAM: usize = 9000;
const PROBE_WINDOW: Duration = Duration::from_secs(2);

/// Sightings remembered for deduplication before the oldest are forgotten.
const SEEN_LIMIT: usize = 4096;

type Sighting = (Option<String>, IpAddr);

/// Insertion-ordered set that forgets its oldest entries past `limit`.
struct Sightings {
    limit: usize,
    known: HashSet<Sighting>,
    order: VecDeque<Sighting>,
}

impl Sightings {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            known: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// `true` if `sighting` was not remembered yet.
    fn insert(&mut self, sighting: Sighting) -> bool {
        if !self.known.insert(sighting.clone()) {
            return false;
        }
        self.order.push_back(sighting);
        while self.order.len() > self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.known.remove(&oldest);
            }
        }
        true
    }
}

pub struct MdnsListener {
    bind: SocketAddrV4,
    group: Option<Ipv4Addr>,
    window: Duration,
    socket: Option<UdpSocket>,
    seen: Sightings,
}

impl MdnsListener {
    /// Listens on `bind`, joining `group` when given.
    pub fn with_bind(bind: SocketAddrV4, group: Option<Ipv4Addr>) -> Self {
        Self {
            bind,
            group,
            window: PROBE_WINDOW,
            socket: None,
            seen: Sightings::new(SEEN_LIMIT),
        }
    }

    /// How long a single [`Discoverer::probe_once`] waits for an announcement.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// How many sightings are remembered; older ones may be reported again.
    pub fn with_seen_limit(mut self, limit: usize) -> Self {
        self.seen = Sightings::new(limit.max(1));
        self
    }

    /// Address of the bound socket, once validated.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    async fn bind(&self) -> Result<UdpSocket, DiscoveryError> {
        let socket = UdpSocket::bind(self.bind)
            .await
            .map_err(|e| DiscoveryError::dependency(format!("cannot bind {}: {e}", self.bind)))?;

        if let Some(group) = self.group {
            socket
                .join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)
                .map_err(|e| DiscoveryError::dependency(format!("cannot join {group}: {e}")))?;
        }

        Ok(socket)
    }

    async fn socket(&mut self) -> Result<UdpSocket, DiscoveryError> {
        match self.socket.take() {
            Some(socket) => Ok(socket),
            None => self.bind().await,
        }
    }

    /// Turns one datagram into a record holding the sightings not reported
    /// before.
    fn observe(&mut self, datagram: &[u8], from: SocketAddr) -> Option<FactRecord> {
        let announced = match mdns::extract_resource(datagram) {
            Ok(record) => record,
            Err(e) => {
                trace!(%from, "ignoring undecodable mdns datagram: {e:#}");
                return None;
            }
        };

        let devices = self.new_sightings(announced);
        if devices.is_empty() {
            return None;
        }

        debug!(%from, count = devices.len(), "new mdns sightings");
        let mut record = FactRecord::new();
        for device in devices {
            record.push(Category::Devices, device);
        }
        Some(record)
    }

    fn new_sightings(&mut self, announced: MdnsRecord) -> Vec<Entity> {
        let MdnsRecord { hostname, ips } = announced;

        ips.into_iter()
            .filter(|ip| self.seen.insert((hostname.clone(), *ip)))
            .map(|ip| {
                let key = match ip {
                    IpAddr::V4(_) => "ipv4.address",
                    IpAddr::V6(_) => "ipv6.address",
                };
                let mut device = Entity::new().with(key, ip).with("seen.via", "mdns");
                if let Some(name) = &hostname {
                    device.set("hostname", name.as_str());
                }
                device
            })
            .collect()
    }
}

impl Default for MdnsListener {
    fn default() -> Self {
        Self::with_bind(
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT),
            Some(MDNS_GROUP_V4),
        )
    }
}

impl Plugin for MdnsListener {
    const NAME: &'static str = "mdns";
    const DESCRIPTION: &'static str = "hostnames and addresses from multicast DNS announcements";

    fn create() -> Result<Self, DiscoveryError> {
        Ok(Self::default())
    }
}

#[async_trait]
impl Discoverer for MdnsListener {
    async fn validate(&mut self) -> Result<(), DiscoveryError> {
        let socket = self.bind().await?;
        self.socket = Some(socket);
        Ok(())
    }

    /// Waits up to one window for a single announcement. The socket is closed
    /// afterwards.
    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
        let socket = self.socket().await?;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        match tokio::time::timeout(self.window, socket.recv_from(&mut buf)).await {
            Err(_) => Ok(Vec::new()),
            Ok(Err(e)) => Err(DiscoveryError::probe(format!("mdns receive: {e}"))),
            Ok(Ok((len, from))) => Ok(self.observe(&buf[..len], from).into_iter().collect()),
        }
    }

    async fn run(&mut self, ctx: &mut RunContext) -> Result<(), DiscoveryError> {
        let socket = self.socket().await?;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let received = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Ok(()),
                received = socket.recv_from(&mut buf) => received,
            };

            match received {
                Ok((len, from)) => {
                    if let Some(record) = self.observe(&buf[..len], from) {
                        ctx.emit(vec![record]).await?;
                    }
                }
                Err(e) => {
                    ctx.probe_failed(&DiscoveryError::probe(format!("mdns receive: {e}")));
                    if !ctx.sleep().await {
                        return Ok(());
                    }
                }
            }
        }
    }
}

register_discoverer!(MdnsListener);

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
