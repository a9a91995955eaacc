use lookout_common::config::Config;
use lookout_core::{PluginDescriptor, PluginRegistry, policy_allows};

use crate::terminal::print;

pub fn list(registry: &PluginRegistry, cfg: &Config) {
    let plugins: Vec<PluginDescriptor> = registry.discover_sorted();

    print::header("available plugins");
    if plugins.is_empty() {
        print::aligned_line("plugins", 7, "none registered");
        return;
    }

    let key_width = plugins.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for plugin in &plugins {
        print::aligned_line(plugin.name, key_width, &describe(plugin, cfg));
    }
    print::separator();
}

fn describe(plugin: &PluginDescriptor, cfg: &Config) -> String {
    let kind = match (plugin.passive, plugin.intrusive) {
        (_, true) => "intrusive",
        (true, false) => "passive",
        (false, false) => "active",
    };

    let status = if cfg.is_excluded(plugin.name) {
        "excluded"
    } else if !policy_allows(plugin, cfg.allow_intrusive) {
        "needs --intrusive"
    } else {
        "enabled"
    };

    format!("{} [{kind}, {status}]", plugin.description)
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
    use lookout_plugins::{ArpDiscoverer, TcpSweep};

    #[test]
    fn status_follows_policy_and_exclusions() {
        let sweep = PluginDescriptor::of::<TcpSweep>();
        let arp = PluginDescriptor::of::<ArpDiscoverer>();

        let mut cfg = Config::default();
        assert!(describe(&sweep, &cfg).ends_with("[intrusive, needs --intrusive]"));
        assert!(describe(&arp, &cfg).ends_with("[passive, enabled]"));

        cfg.allow_intrusive = true;
        cfg.exclude.push(String::from("arp"));
        assert!(describe(&sweep, &cfg).ends_with("[intrusive, enabled]"));
        assert!(describe(&arp, &cfg).ends_with("[passive, excluded]"));
    }
}
