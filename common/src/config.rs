use std::collections::HashMap;
use std::time::Duration;

use crate::error::DiscoveryError;

/// Sleep between two probe cycles of the same worker unless overridden.
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for workers to wind down before aborting them.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a plugin's pre-flight check may take before it counts as unmet.
pub const DEFAULT_VALIDATE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    /// Default sleep between probe cycles.
    pub loop_interval: Duration,

    /// Permits discoverers that actively probe the network or hosts.
    ///
    /// Off by default: nothing intrusive runs unless the operator asks for it.
    pub allow_intrusive: bool,

    /// Plugins the operator disabled by name, regardless of policy.
    pub exclude: Vec<String>,

    /// Per-plugin loop intervals, keyed by plugin name.
    pub interval_overrides: HashMap<String, Duration>,

    pub shutdown_timeout: Duration,

    pub validate_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loop_interval: DEFAULT_LOOP_INTERVAL,
            allow_intrusive: false,
            exclude: Vec::new(),
            interval_overrides: HashMap::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            validate_timeout: DEFAULT_VALIDATE_TIMEOUT,
        }
    }
}

impl Config {
    /// Rejects zero loop intervals, globally or per plugin.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.loop_interval.is_zero() {
            return Err(DiscoveryError::InvalidInterval(self.loop_interval));
        }
        if let Some(zero) = self.interval_overrides.values().find(|d| d.is_zero()) {
            return Err(DiscoveryError::InvalidInterval(*zero));
        }
        Ok(())
    }

    /// Loop interval for `plugin`, honoring overrides.
    pub fn interval_for(&self, plugin: &str) -> Duration {
        self.interval_overrides
            .get(plugin)
            .copied()
            .unwrap_or(self.loop_interval)
    }

    pub fn is_excluded(&self, plugin: &str) -> bool {
        self.exclude.iter().any(|name| name == plugin)
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
