use lookout_core::PluginDescriptor;

fn flags(plugins: &[PluginDescriptor]) -> Vec<(&'static str, bool, bool)> {
    plugins.iter().map(|p| (p.name, p.passive, p.intrusive)).collect()
}

#[test]
fn builtin_plugins_are_all_registered() {
    let registry = lookout_plugins::registry();
    let report = registry.load_all();

    assert!(report.failures.is_empty(), "load failures: {:?}", report.failures);

    let mut loaded = report.loaded;
    loaded.sort_by_key(|p| p.name);
    assert_eq!(
        flags(&loaded),
        vec![
            ("arp", true, false),
            ("interfaces", true, false),
            ("mdns", false, false),
            ("routes", true, false),
            ("tcp-sweep", false, true),
        ]
    );
}

#[test]
fn discovery_is_repeatable() {
    let first = lookout_plugins::registry().discover_sorted();
    let second = lookout_plugins::registry().discover_sorted();
    assert_eq!(first, second);
}

#[test]
fn every_builtin_can_be_instantiated() {
    for plugin in lookout_plugins::registry().discover_plugins() {
        assert!(
            plugin.instantiate().is_ok(),
            "{} could not be constructed",
            plugin.name
        );
    }
}
