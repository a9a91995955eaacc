use pnet::datalink::NetworkInterface;
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use thiserror::Error;

#[cfg(target_os = "linux")]
pub use linux_impl::{is_physical, is_wireless};
#[cfg(not(target_os = "linux"))]
pub use fallback_impl::{is_physical, is_wireless};

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ViabilityError {
    #[error("interface is down")]
    IsDown,
    /// Loopback traffic never leaves the host.
    #[error("interface is loopback")]
    IsLoopback,
    #[error("interface has no MAC address")]
    NoMacAddress,
    #[error("interface does not support broadcast")]
    NotBroadcast,
    /// A point-to-point link (e.g., a VPN).
    #[error("interface is point-to-point")]
    IsPointToPoint,
    #[error("interface has no private IPv4 address")]
    NoPrivateIpv4,
}

/// Whether an active sweep may originate from `interface`.
///
/// Only broadcast-capable LAN interfaces holding a private IPv4 address
/// qualify, so active probing never leaks onto VPNs or public networks.
pub fn check_sweepable(interface: &NetworkInterface) -> Result<(), ViabilityError> {
    if !interface.is_up() {
        return Err(ViabilityError::IsDown);
    }
    if interface.is_loopback() {
        return Err(ViabilityError::IsLoopback);
    }
    if interface.mac.is_none() {
        return Err(ViabilityError::NoMacAddress);
    }
    if !interface.is_broadcast() {
        return Err(ViabilityError::NotBroadcast);
    }
    if interface.is_point_to_point() {
        return Err(ViabilityError::IsPointToPoint);
    }
    let has_private = interface.ips.iter().any(|net| match net {
        IpNetwork::V4(ipv4) => ipv4.ip().is_private(),
        IpNetwork::V6(_) => false,
    });
    if !has_private {
        return Err(ViabilityError::NoPrivateIpv4);
    }

    Ok(())
}

/// Private IPv4 networks reachable from sweepable interfaces, tagged with the
/// interface name. Duplicates (two interfaces on one subnet) are dropped.
pub fn sweepable_networks(interfaces: &[NetworkInterface]) -> Vec<(String, Ipv4Network)> {
    let mut out: Vec<(String, Ipv4Network)> = Vec::new();

    for interface in interfaces {
        if let Err(reason) = check_sweepable(interface) {
            tracing::debug!(interface = %interface.name, %reason, "skipping interface");
            continue;
        }

        for net in &interface.ips {
            let IpNetwork::V4(v4) = net else { continue };
            if !v4.ip().is_private() {
                continue;
            }
            if out.iter().any(|(_, seen)| seen.network() == v4.network() && seen.prefix() == v4.prefix()) {
                continue;
            }
            out.push((interface.name.clone(), *v4));
        }
    }

    out
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::path::Path;

    pub fn is_physical(interface: &NetworkInterface) -> bool {
        Path::new(&format!("/sys/class/net/{}/device", interface.name)).exists()
    }

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        Path::new(&format!("/sys/class/net/{}/wireless", interface.name)).exists()
    }
}

#[cfg(not(target_os = "linux"))]
mod fallback_impl {
    use super::*;

    pub fn is_physical(interface: &NetworkInterface) -> bool {
        !interface.is_loopback() && interface.mac.is_some()
    }

    pub fn is_wireless(_interface: &NetworkInterface) -> bool {
        false
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

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::datalink::MacAddr;
    use std::net::Ipv4Addr;

    const IFF_UP: u32 = 1;
    const IFF_BROADCAST: u32 = 1 << 1;
    const IFF_LOOPBACK: u32 = 1 << 3;
    const IFF_POINTOPOINT: u32 = 1 << 4;
    const IFF_RUNNING: u32 = 1 << 6;

    fn ni(name: &str, mac: Option<MacAddr>, ips: &[IpNetwork], flags: u32) -> NetworkInterface {
        NetworkInterface {
            name: name.into(),
            description: "".into(),
            index: 1,
            mac,
            ips: ips.to_vec(),
            flags,
        }
    }

    fn v4(a: u8, b: u8, c: u8, d: u8, p: u8) -> IpNetwork {
        IpNetwork::V4(Ipv4Network::new(Ipv4Addr::new(a, b, c, d), p).unwrap())
    }

    fn mac() -> Option<MacAddr> {
        Some(MacAddr::new(0, 1, 2, 3, 4, 5))
    }

    const LAN: u32 = IFF_UP | IFF_RUNNING | IFF_BROADCAST;

    #[test]
    fn lan_interface_is_sweepable() {
        let eth = ni("eth0", mac(), &[v4(192, 168, 1, 10, 24)], LAN);
        assert_eq!(check_sweepable(&eth), Ok(()));
    }

    #[test]
    fn rejects_down_loopback_and_vpn() {
        let down = ni("eth1", mac(), &[v4(192, 168, 1, 10, 24)], IFF_BROADCAST);
        assert_eq!(check_sweepable(&down), Err(ViabilityError::IsDown));

        let lo = ni("lo", None, &[v4(127, 0, 0, 1, 8)], IFF_UP | IFF_RUNNING | IFF_LOOPBACK);
        assert_eq!(check_sweepable(&lo), Err(ViabilityError::IsLoopback));

        let tun = ni("tun0", mac(), &[v4(10, 8, 0, 2, 24)], LAN | IFF_POINTOPOINT);
        assert_eq!(check_sweepable(&tun), Err(ViabilityError::IsPointToPoint));
    }

    #[test]
    fn rejects_public_only_interfaces() {
        let eth = ni("eth0", mac(), &[v4(8, 8, 8, 8, 24)], LAN);
        assert_eq!(check_sweepable(&eth), Err(ViabilityError::NoPrivateIpv4));
    }

    #[test]
    fn rejections_read_as_errors() {
        let err: Box<dyn std::error::Error> = Box::new(ViabilityError::IsPointToPoint);
        assert_eq!(err.to_string(), "interface is point-to-point");
        assert_eq!(ViabilityError::IsDown.to_string(), "interface is down");
    }

    #[test]
    fn sweepable_networks_dedups_shared_subnets() {
        let interfaces = vec![
            ni("eth0", mac(), &[v4(192, 168, 1, 10, 24), v4(8, 8, 8, 8, 24)], LAN),
            ni("eth1", mac(), &[v4(192, 168, 1, 11, 24)], LAN),
            ni("lo", None, &[v4(127, 0, 0, 1, 8)], IFF_UP | IFF_LOOPBACK),
        ];

        let nets = sweepable_networks(&interfaces);
        assert_eq!(nets.len(), 1);
        assert_eq!(nets[0].0, "eth0");
        assert_eq!(nets[0].1.ip(), Ipv4Addr::new(192, 168, 1, 10));
    }
}
