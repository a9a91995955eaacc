use std::time::Duration;

use thiserror::Error;

/// Failures a discoverer or the discovery framework can report.
///
/// Every variant except [`DiscoveryError::NoWorkersStarted`] is contained at
/// the plugin boundary: it is logged, reported as an event and the plugin is
/// skipped or its cycle retried. Only a total start failure reaches the host.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A registered plugin could not be turned into a descriptor.
    #[error("plugin '{plugin}' failed to load: {reason}")]
    PluginLoad { plugin: String, reason: String },

    /// Host prerequisites for a plugin are not met (missing table, socket busy, ...).
    #[error("dependency unmet: {0}")]
    DependencyUnmet(String),

    /// A single probe cycle failed. The worker keeps looping.
    #[error("probe failed: {0}")]
    Probe(String),

    /// The run loop itself cannot continue. Terminates only the owning worker.
    #[error("fatal worker defect: {0}")]
    FatalWorkerDefect(String),

    #[error("loop interval must be greater than zero, got {0:?}")]
    InvalidInterval(Duration),

    /// Plugins were eligible to run but not a single one could be started.
    #[error("none of the {attempted} eligible plugins could be started")]
    NoWorkersStarted { attempted: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    pub fn dependency(reason: impl std::fmt::Display) -> Self {
        Self::DependencyUnmet(reason.to_string())
    }

    pub fn probe(reason: impl std::fmt::Display) -> Self {
        Self::Probe(reason.to_string())
    }

    pub fn fatal(reason: impl std::fmt::Display) -> Self {
        Self::FatalWorkerDefect(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
