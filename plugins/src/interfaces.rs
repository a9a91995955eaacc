//! Passive discovery of this host's own network interfaces and the networks
//! they are attached to.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::IpNetwork;
use pnet::util::MacAddr;

use lookout_common::network::interface::{is_physical, is_wireless};
use lookout_common::utils::interface::NetworkInterfaceExtension;
use lookout_common::{Category, DiscoveryError, Entity, FactRecord, Value};
use lookout_core::{Discoverer, Plugin, register_discoverer};

#[derive(Default)]
pub struct InterfaceDiscoverer;

impl Plugin for InterfaceDiscoverer {
    const NAME: &'static str = "interfaces";
    const PASSIVE: bool = true;
    const DESCRIPTION: &'static str = "local interfaces and their networks";

    fn create() -> Result<Self, DiscoveryError> {
        Ok(Self)
    }
}

#[async_trait]
impl Discoverer for InterfaceDiscoverer {
    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
        let interfaces = datalink::interfaces();
        let record = describe(&interfaces);
        if record.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![record])
    }
}

register_discoverer!(InterfaceDiscoverer);

/// One interface entity per interface, one network entity per attached
/// network, interfaces in enumeration order.
pub fn describe(interfaces: &[NetworkInterface]) -> FactRecord {
    let mut record = FactRecord::new();

    for interface in interfaces {
        record.push(Category::Interfaces, interface_entity(interface));

        for net in &interface.ips {
            record.push(Category::Networks, network_entity(&interface.name, net));
        }
    }

    record
}

fn interface_entity(interface: &NetworkInterface) -> Entity {
    let mut entity = Entity::new()
        .with("if.name", interface.name.as_str())
        .with("if.index", interface.index)
        .with("if.flags", interface.flag_names().join(","))
        .with("if.up", interface.is_up())
        .with("if.loopback", interface.is_loopback())
        .with("if.physical", is_physical(interface))
        .with("if.wireless", is_wireless(interface));

    if let Some(mac) = interface.mac.filter(|mac| *mac != MacAddr::zero()) {
        entity.set("eth.address", mac);
    }
    if let Some(v4) = interface.get_ipv4_nets().first() {
        entity.set("ipv4.address", v4.ip());
    }
    if let Some(v6) = interface.get_ipv6_nets().first() {
        entity.set("ipv6.address", std::net::IpAddr::V6(v6.ip()));
    }

    let addresses: BTreeMap<String, Value> = interface
        .ips
        .iter()
        .map(|net| (net.to_string(), Value::from(family(net))))
        .collect();
    if !addresses.is_empty() {
        entity.set("addresses", addresses);
    }

    entity
}

fn network_entity(interface: &str, net: &IpNetwork) -> Entity {
    let (network, prefix) = match net {
        IpNetwork::V4(v4) => (std::net::IpAddr::V4(v4.network()), v4.prefix()),
        IpNetwork::V6(v6) => (std::net::IpAddr::V6(v6.network()), v6.prefix()),
    };

    Entity::new()
        .with(format!("{}.network", family(net)), format!("{network}/{prefix}"))
        .with("if.name", interface)
}

fn family(net: &IpNetwork) -> &'static str {
    match net {
        IpNetwork::V4(_) => "ipv4",
        IpNetwork::V6(_) => "ipv6",
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
