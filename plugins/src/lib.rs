//! # Built-in Discoverers
//!
//! Every module here registers its discoverer with the global registry, so
//! linking this crate is all a host needs to do. Call [`registry`] to get the
//! loaded set.
//!
//! | name         | passive | intrusive | source                       |
//! |--------------|---------|-----------|------------------------------|
//! | `arp`        | yes     | no        | kernel ARP table             |
//! | `interfaces` | yes     | no        | local network interfaces     |
//! | `routes`     | yes     | no        | kernel IPv4 routing table    |
//! | `mdns`       | no      | no        | multicast DNS announcements  |
//! | `tcp-sweep`  | no      | yes       | TCP connect sweep of the LAN |

pub mod arp;
pub mod interfaces;
pub mod mdns;
pub mod routes;
pub mod tcp_sweep;

mod table;

use lookout_core::PluginRegistry;

pub use arp::ArpDiscoverer;
pub use interfaces::InterfaceDiscoverer;
pub use mdns::MdnsListener;
pub use routes::RouteDiscoverer;
pub use tcp_sweep::TcpSweep;

/// All discoverers linked into this binary.
pub fn registry() -> PluginRegistry {
    PluginRegistry::collected()
}
