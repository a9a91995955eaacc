//! Structured lifecycle events.
//!
//! Everything the framework logs about a plugin is also published here, so a
//! host (or a test) can react to lost plugins without scraping log lines.

use tokio::sync::mpsc::UnboundedSender;

use crate::worker::WorkerExit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A registered plugin could not be loaded into a descriptor.
    PluginLoadFailed { plugin: String, error: String },
    /// Skipped because it is intrusive and intrusive probing was not allowed.
    PluginFiltered { plugin: String },
    /// Skipped because the operator excluded it by name.
    PluginExcluded { plugin: String },
    /// Construction or validation failed; the plugin never ran.
    PluginFailedToStart { plugin: String, error: String },
    WorkerStarted { plugin: String },
    /// One probe cycle failed; the worker carries on.
    ProbeFailed { plugin: String, cycle: u64, error: String },
    WorkerStopped { plugin: String, exit: WorkerExit },
}

impl DiscoveryEvent {
    pub fn plugin(&self) -> &str {
        match self {
            DiscoveryEvent::PluginLoadFailed { plugin, .. }
            | DiscoveryEvent::PluginFiltered { plugin }
            | DiscoveryEvent::PluginExcluded { plugin }
            | DiscoveryEvent::PluginFailedToStart { plugin, .. }
            | DiscoveryEvent::WorkerStarted { plugin }
            | DiscoveryEvent::ProbeFailed { plugin, .. }
            | DiscoveryEvent::WorkerStopped { plugin, .. } => plugin,
        }
    }
}

/// Optional event channel. Publishing never fails and never blocks.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<DiscoveryEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<DiscoveryEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: DiscoveryEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
