use pnet::datalink::NetworkInterface;

use pnet::ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

pub trait NetworkInterfaceExtension {
    fn get_ipv4_nets(&self) -> Vec<Ipv4Network>;
    fn get_ipv6_nets(&self) -> Vec<Ipv6Network>;
    /// Human readable flag names (`up`, `broadcast`, ...), for fact output.
    fn flag_names(&self) -> Vec<&'static str>;
}

impl NetworkInterfaceExtension for NetworkInterface {
    fn get_ipv4_nets(&self) -> Vec<Ipv4Network> {
        self.ips
            .iter()
            .filter_map(|ip| {
                if let IpNetwork::V4(ipv4) = ip {
                    Some(*ipv4)
                } else {
                    None
                }
            })
            .collect()
    }

    fn get_ipv6_nets(&self) -> Vec<Ipv6Network> {
        self.ips
            .iter()
            .filter_map(|ip| {
                if let IpNetwork::V6(ipv6) = ip {
                    Some(*ipv6)
                } else {
                    None
                }
            })
            .collect()
    }

    fn flag_names(&self) -> Vec<&'static str> {
        let checks: [(bool, &'static str); 5] = [
            (self.is_up(), "up"),
            (self.is_broadcast(), "broadcast"),
            (self.is_multicast(), "multicast"),
            (self.is_loopback(), "loopback"),
            (self.is_point_to_point(), "point-to-point"),
        ];
        checks
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect()
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
