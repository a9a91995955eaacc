use std::time::Duration;

use async_trait::async_trait;
use lookout_common::config::Config;
use lookout_common::{Category, DiscoveryError, Entity, FactRecord, output};
use lookout_core::registry::{PluginDescriptor, PluginEntry, PluginRegistry, load};
use lookout_core::{Discoverer, DiscoveryEvent, Plugin, Supervisor, WorkerExit};
use tokio::sync::mpsc;

struct Healthy;
struct Unmet;

/// Panics on its first cycle only.
struct Crashing {
    calls: u64,
}

#[async_trait]
impl Discoverer for Healthy {
    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
        let device = Entity::new().with("hostname", "healthy.local");
        Ok(vec![FactRecord::new().with(Category::Devices, device)])
    }
}

#[async_trait]
impl Discoverer for Unmet {
    async fn validate(&mut self) -> Result<(), DiscoveryError> {
        Err(DiscoveryError::dependency("no such table"))
    }

    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
        unreachable!("never validated")
    }
}

#[async_trait]
impl Discoverer for Crashing {
    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
        self.calls += 1;
        if self.calls == 1 {
            panic!("probe blew up");
        }
        let device = Entity::new().with("hostname", "recovered.local");
        Ok(vec![FactRecord::new().with(Category::Devices, device)])
    }
}

impl Plugin for Healthy {
    const NAME: &'static str = "healthy";
    fn create() -> Result<Self, DiscoveryError> {
        Ok(Self)
    }
}

impl Plugin for Unmet {
    const NAME: &'static str = "unmet";
    fn create() -> Result<Self, DiscoveryError> {
        Ok(Self)
    }
}

impl Plugin for Crashing {
    const NAME: &'static str = "crashing";
    fn create() -> Result<Self, DiscoveryError> {
        Ok(Self { calls: 0 })
    }
}

fn broken_loader() -> Result<PluginDescriptor, DiscoveryError> {
    Err(DiscoveryError::PluginLoad {
        plugin: String::from("broken"),
        reason: String::from("metadata unreadable"),
    })
}

fn panicking_loader() -> Result<PluginDescriptor, DiscoveryError> {
    panic!("loader exploded")
}

fn config() -> Config {
    Config {
        loop_interval: Duration::from_secs(3600),
        ..Config::default()
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<DiscoveryEvent>) -> Vec<DiscoveryEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn one_bad_plugin_costs_only_itself() {
    let registry = PluginRegistry::from_entries([
        PluginEntry::new("broken", broken_loader),
        PluginEntry::new("exploding", panicking_loader),
        PluginEntry::new(Unmet::NAME, load::<Unmet>),
        PluginEntry::new(Healthy::NAME, load::<Healthy>),
    ]);
    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
    let supervisor = Supervisor::new(registry, config()).with_events(ev_tx);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let discovery = supervisor
        .start_discovery(output::unbounded(tx), false)
        .await
        .unwrap();
    assert_eq!(discovery.names(), vec!["healthy"]);

    let record = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.source(), Some("healthy"));

    let events = drain(&mut ev_rx);
    let load_failures: Vec<&str> = events
        .iter()
        .filter(|e| matches!(e, DiscoveryEvent::PluginLoadFailed { .. }))
        .map(DiscoveryEvent::plugin)
        .collect();
    assert_eq!(load_failures, vec!["broken", "exploding"]);
    assert!(events.iter().any(|e| matches!(
        e,
        DiscoveryEvent::PluginFailedToStart { plugin, error }
            if plugin == "unmet" && error.contains("no such table")
    )));
    assert!(events.contains(&DiscoveryEvent::WorkerStarted {
        plugin: String::from("healthy")
    }));

    let exits = discovery.shutdown().await;
    assert_eq!(exits, vec![(String::from("healthy"), WorkerExit::Stopped)]);
}

#[tokio::test]
async fn a_panicking_cycle_is_followed_by_the_next_one() {
    let registry = PluginRegistry::from_entries([
        PluginEntry::new(Crashing::NAME, load::<Crashing>),
        PluginEntry::new(Healthy::NAME, load::<Healthy>),
    ]);
    let config = Config {
        loop_interval: Duration::from_millis(10),
        ..Config::default()
    };
    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel();
    let supervisor = Supervisor::new(registry, config).with_events(ev_tx);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let discovery = supervisor
        .start_discovery(output::unbounded(tx), false)
        .await
        .unwrap();
    assert_eq!(discovery.len(), 2);

    let recovered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let record = rx.recv().await.unwrap();
            if record.source() == Some("crashing") {
                return record;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(
        recovered.devices()[0].get("hostname").and_then(|v| v.as_text()),
        Some("recovered.local")
    );

    let events = drain(&mut ev_rx);
    assert!(events.iter().any(|e| matches!(
        e,
        DiscoveryEvent::ProbeFailed { plugin, cycle: 1, error }
            if plugin == "crashing" && error.contains("probe blew up")
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, DiscoveryEvent::WorkerStopped { .. })));

    let exits = discovery.shutdown().await;
    assert_eq!(
        exits,
        vec![
            (String::from("crashing"), WorkerExit::Stopped),
            (String::from("healthy"), WorkerExit::Stopped),
        ]
    );
}

#[tokio::test]
async fn nothing_started_is_an_error() {
    let registry = PluginRegistry::from_entries([PluginEntry::new(Unmet::NAME, load::<Unmet>)]);
    let supervisor = Supervisor::new(registry, config());

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = supervisor.start_discovery(output::unbounded(tx), false).await;
    assert!(matches!(
        result,
        Err(DiscoveryError::NoWorkersStarted { attempted: 1 })
    ));
}

#[tokio::test]
async fn nothing_eligible_is_an_empty_discovery() {
    let supervisor = Supervisor::new(PluginRegistry::default(), config());

    let (tx, _rx) = mpsc::unbounded_channel();
    let discovery = supervisor
        .start_discovery(output::unbounded(tx), false)
        .await
        .unwrap();
    assert!(discovery.is_empty());
    assert!(discovery.shutdown().await.is_empty());
}
