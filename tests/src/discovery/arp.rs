use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use lookout_common::config::Config;
use lookout_common::{DiscoveryError, FactRecord, output};
use lookout_core::registry::{PluginEntry, PluginRegistry, load};
use lookout_core::{Discoverer, Plugin, Supervisor, WorkerExit};
use lookout_plugins::ArpDiscoverer;
use tokio::sync::mpsc;

static TABLE: OnceLock<PathBuf> = OnceLock::new();

/// The real ARP plugin, reading a fixture table instead of `/proc/net/arp`.
struct FixtureArp(ArpDiscoverer);

#[async_trait]
impl Discoverer for FixtureArp {
    async fn validate(&mut self) -> Result<(), DiscoveryError> {
        self.0.validate().await
    }

    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
        self.0.probe_once().await
    }
}

impl Plugin for FixtureArp {
    const NAME: &'static str = "fixture-arp";
    const PASSIVE: bool = true;

    fn create() -> Result<Self, DiscoveryError> {
        let path = TABLE
            .get()
            .ok_or_else(|| DiscoveryError::dependency("fixture table not written"))?;
        Ok(Self(ArpDiscoverer::with_path(path.clone())))
    }
}

#[tokio::test]
async fn arp_cache_flows_through_the_supervisor() {
    let mut table = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        table,
        "IP address       HW type     Flags       HW address            Mask     Device\n\
         192.168.1.5      0x1         0x2         AA:BB:CC:DD:EE:FF     *        eth0\n\
         192.168.1.9      0x1         0x0         00:00:00:00:00:00     *        eth0"
    )
    .unwrap();
    TABLE.set(table.path().to_path_buf()).unwrap();

    let registry = PluginRegistry::from_entries([PluginEntry::new(FixtureArp::NAME, load::<FixtureArp>)]);
    let cfg = Config {
        loop_interval: Duration::from_secs(3600),
        ..Config::default()
    };
    let supervisor = Supervisor::new(registry, cfg);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let discovery = supervisor
        .start_discovery(output::unbounded(tx), false)
        .await
        .unwrap();
    assert_eq!(discovery.names(), vec!["fixture-arp"]);

    let record = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        serde_json::json!({
            "source": "fixture-arp",
            "devices": [{
                "eth.address": "aa:bb:cc:dd:ee:ff",
                "if.name": "eth0",
                "ipv4.address": "192.168.1.5",
            }],
        })
    );

    let exits = discovery.shutdown().await;
    assert_eq!(exits, vec![(String::from("fixture-arp"), WorkerExit::Stopped)]);
}
