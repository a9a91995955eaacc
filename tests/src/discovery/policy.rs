use lookout_common::config::Config;
use lookout_core::{DiscoveryEvent, Supervisor};
use tokio::sync::mpsc;

fn names(supervisor: &Supervisor, allow_intrusive: bool) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = supervisor
        .eligible(allow_intrusive)
        .into_iter()
        .map(|p| p.name)
        .collect();
    names.sort();
    names
}

#[test]
fn intrusive_plugins_need_consent() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let supervisor = Supervisor::new(lookout_plugins::registry(), Config::default()).with_events(tx);

    assert_eq!(
        names(&supervisor, false),
        vec!["arp", "interfaces", "mdns", "routes"]
    );
    assert_eq!(
        rx.try_recv().unwrap(),
        DiscoveryEvent::PluginFiltered {
            plugin: String::from("tcp-sweep")
        }
    );

    assert_eq!(
        names(&supervisor, true),
        vec!["arp", "interfaces", "mdns", "routes", "tcp-sweep"]
    );
}

#[test]
fn excluded_plugins_never_become_eligible() {
    let cfg = Config {
        exclude: vec![String::from("mdns"), String::from("tcp-sweep")],
        ..Config::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let supervisor = Supervisor::new(lookout_plugins::registry(), cfg).with_events(tx);

    assert_eq!(names(&supervisor, true), vec!["arp", "interfaces", "routes"]);

    let mut excluded = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let DiscoveryEvent::PluginExcluded { plugin } = event {
            excluded.push(plugin);
        }
    }
    excluded.sort();
    assert_eq!(excluded, vec!["mdns", "tcp-sweep"]);
}
