//! # Plugin Registry
//!
//! Plugins register themselves at link time with [`register_discoverer!`];
//! there is no runtime loading. Adding a plugin is a matter of writing the
//! type and one registration line next to it.
//!
//! Loading turns each registration entry into a [`PluginDescriptor`]: the
//! capability flags plus a factory. A broken entry (malformed metadata, a
//! duplicate name, a panic while loading) is logged and skipped; the rest of
//! the batch is unaffected.
//!
//! [`register_discoverer!`]: crate::register_discoverer

use std::collections::HashSet;
use std::panic;

use tracing::{debug, error};

use lookout_common::DiscoveryError;

use crate::discoverer::{Discoverer, Plugin};
use crate::worker::panic_message;

/// A link-time registration record.
#[derive(Clone, Copy)]
pub struct PluginEntry {
    pub name: &'static str,
    pub load: fn() -> Result<PluginDescriptor, DiscoveryError>,
}

impl PluginEntry {
    pub const fn new(name: &'static str, load: fn() -> Result<PluginDescriptor, DiscoveryError>) -> Self {
        Self { name, load }
    }
}

impl std::fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEntry").field("name", &self.name).finish_non_exhaustive()
    }
}

inventory::collect!(PluginEntry);

/// Loaded, queryable, not-yet-running representation of a plugin.
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    pub name: &'static str,
    pub intrusive: bool,
    pub passive: bool,
    pub description: &'static str,
    factory: fn() -> Result<Box<dyn Discoverer>, DiscoveryError>,
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("intrusive", &self.intrusive)
            .field("passive", &self.passive)
            .finish_non_exhaustive()
    }
}

impl PartialEq for PluginDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.intrusive == other.intrusive && self.passive == other.passive
    }
}

impl Eq for PluginDescriptor {}

impl PluginDescriptor {
    /// Reads the static metadata of `P`. Never instantiates it.
    pub fn of<P: Plugin>() -> Self {
        Self {
            name: P::NAME,
            intrusive: P::INTRUSIVE,
            passive: P::PASSIVE,
            description: P::DESCRIPTION,
            factory: build::<P>,
        }
    }

    /// Builds a fresh discoverer instance.
    pub fn instantiate(&self) -> Result<Box<dyn Discoverer>, DiscoveryError> {
        match panic::catch_unwind(self.factory) {
            Ok(result) => result,
            Err(payload) => Err(DiscoveryError::DependencyUnmet(format!(
                "constructor panicked: {}",
                panic_message(payload)
            ))),
        }
    }
}

fn build<P: Plugin>() -> Result<Box<dyn Discoverer>, DiscoveryError> {
    P::create().map(|plugin| Box::new(plugin) as Box<dyn Discoverer>)
}

/// Default loader used by [`register_discoverer!`]: checks the metadata and
/// produces the descriptor.
///
/// [`register_discoverer!`]: crate::register_discoverer
pub fn load<P: Plugin>() -> Result<PluginDescriptor, DiscoveryError> {
    check_name(P::NAME)?;
    Ok(PluginDescriptor::of::<P>())
}

fn check_name(name: &str) -> Result<(), DiscoveryError> {
    let well_formed = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if well_formed {
        Ok(())
    } else {
        Err(DiscoveryError::PluginLoad {
            plugin: name.to_string(),
            reason: "name must be lowercase ASCII letters, digits or dashes".to_string(),
        })
    }
}

/// Outcome of loading every entry: partial success is the normal case.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<PluginDescriptor>,
    pub failures: Vec<DiscoveryError>,
}

/// The set of plugin entries to load from.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    entries: Vec<PluginEntry>,
}

impl PluginRegistry {
    /// Every entry registered with [`register_discoverer!`] in the linked
    /// crates.
    ///
    /// [`register_discoverer!`]: crate::register_discoverer
    pub fn collected() -> Self {
        let mut entries = Vec::new();
        for entry in inventory::iter::<PluginEntry> {
            entries.push(*entry);
        }
        Self { entries }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = PluginEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads every entry, isolating failures.
    ///
    /// Entry order is whatever the linker produced and is not a contract.
    pub fn load_all(&self) -> LoadReport {
        let mut report = LoadReport::default();
        let mut seen: HashSet<&'static str> = HashSet::new();

        for entry in &self.entries {
            let loaded = match panic::catch_unwind(entry.load) {
                Ok(result) => result,
                Err(payload) => Err(DiscoveryError::PluginLoad {
                    plugin: entry.name.to_string(),
                    reason: format!("panicked while loading: {}", panic_message(payload)),
                }),
            };

            let loaded = loaded.and_then(|descriptor| {
                if seen.insert(descriptor.name) {
                    Ok(descriptor)
                } else {
                    Err(DiscoveryError::PluginLoad {
                        plugin: descriptor.name.to_string(),
                        reason: "another plugin is already registered under this name".to_string(),
                    })
                }
            });

            match loaded {
                Ok(descriptor) => {
                    debug!(plugin = descriptor.name, "plugin loaded");
                    report.loaded.push(descriptor);
                }
                Err(e) => {
                    error!(plugin = entry.name, "skipping plugin: {e}");
                    report.failures.push(e);
                }
            }
        }

        report
    }

    /// Successfully loaded descriptors. Failures are logged, never returned.
    pub fn discover_plugins(&self) -> Vec<PluginDescriptor> {
        self.load_all().loaded
    }

    /// [`PluginRegistry::discover_plugins`] sorted by name, for stable output.
    pub fn discover_sorted(&self) -> Vec<PluginDescriptor> {
        let mut plugins = self.discover_plugins();
        plugins.sort_by_key(|d| d.name);
        plugins
    }
}

/// Registers a [`Plugin`] type with the global registry.
///
/// ```ignore
/// lookout_core::register_discoverer!(ArpDiscoverer);
/// ```
#[macro_export]
macro_rules! register_discoverer {
    ($plugin:ty) => {
        $crate::inventory::submit! {
            $crate::registry::PluginEntry::new(
                <$plugin as $crate::discoverer::Plugin>::NAME,
                $crate::registry::load::<$plugin>,
            )
        }
    };
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
