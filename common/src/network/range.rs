use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;

/// Inclusive range of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    pub fn to_iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(Ipv4Addr::from)
    }

    pub fn len(&self) -> usize {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        if end < start {
            0
        } else {
            (end - start) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Usable host addresses of `network`, narrowed to the `/min_prefix` block
/// around the interface address when the network is wider than that.
///
/// Network and broadcast addresses are excluded for prefixes shorter than 31.
pub fn host_range(network: Ipv4Network, min_prefix: u8) -> Ipv4Range {
    let network = if network.prefix() < min_prefix {
        // Prefix is <= 32 so this cannot fail.
        Ipv4Network::new(network.ip(), min_prefix).unwrap_or(network)
    } else {
        network
    };

    let start: u32 = network.network().into();
    let end: u32 = network.broadcast().into();

    if network.prefix() >= 31 {
        return Ipv4Range::new(Ipv4Addr::from(start), Ipv4Addr::from(end));
    }
    Ipv4Range::new(Ipv4Addr::from(start + 1), Ipv4Addr::from(end - 1))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
