//! # Discovery Supervisor
//!
//! Starts one worker per eligible plugin and hands back the running set.
//!
//! The supervisor is the single policy gate between the operator and active
//! probing: intrusive plugins are filtered out before anything is built,
//! unless the caller explicitly allows them.
//!
//! A plugin that fails anywhere on its way to running (load, construction,
//! validation) costs exactly that plugin. Discovery carries on with the rest
//! and the loss is visible in logs and on the event channel.

use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lookout_common::config::Config;
use lookout_common::{DiscoveryError, Output};

use crate::events::{DiscoveryEvent, EventSink};
use crate::registry::{PluginDescriptor, PluginRegistry};
use crate::worker::{Worker, WorkerExit, WorkerHandle};

/// The policy gate: intrusive plugins only run with explicit consent.
pub fn policy_allows(descriptor: &PluginDescriptor, allow_intrusive: bool) -> bool {
    allow_intrusive || !descriptor.intrusive
}

pub struct Supervisor {
    registry: PluginRegistry,
    config: Config,
    events: EventSink,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(registry: PluginRegistry, config: Config) -> Self {
        Self {
            registry,
            config,
            events: EventSink::disabled(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Publishes lifecycle events on `tx` in addition to logging them.
    pub fn with_events(mut self, tx: UnboundedSender<DiscoveryEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Root of every discovery started here. Cancelling it stops all of them;
    /// [`Discovery::shutdown`] only stops its own.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Loads the registry and applies the policy and exclusion filters.
    ///
    /// Nothing is instantiated here.
    pub fn eligible(&self, allow_intrusive: bool) -> Vec<PluginDescriptor> {
        let report = self.registry.load_all();
        for failure in &report.failures {
            let plugin = match failure {
                DiscoveryError::PluginLoad { plugin, .. } => plugin.clone(),
                _ => String::from("<unknown>"),
            };
            self.events.emit(DiscoveryEvent::PluginLoadFailed {
                plugin,
                error: failure.to_string(),
            });
        }

        report
            .loaded
            .into_iter()
            .filter(|descriptor| {
                if !policy_allows(descriptor, allow_intrusive) {
                    info!(plugin = descriptor.name, "intrusive plugin not allowed, skipping");
                    self.events.emit(DiscoveryEvent::PluginFiltered {
                        plugin: descriptor.name.to_string(),
                    });
                    return false;
                }
                if self.config.is_excluded(descriptor.name) {
                    info!(plugin = descriptor.name, "plugin excluded by configuration");
                    self.events.emit(DiscoveryEvent::PluginExcluded {
                        plugin: descriptor.name.to_string(),
                    });
                    return false;
                }
                true
            })
            .collect()
    }

    /// Starts every eligible plugin as an independent worker bound to
    /// `output`.
    ///
    /// Plugins are validated concurrently, each bounded by the configured
    /// validation timeout, so a slow plugin never holds up the others.
    ///
    /// Individual failures are contained. The only error is
    /// [`DiscoveryError::NoWorkersStarted`], returned when plugins were
    /// eligible but none of them could be started. No eligible plugins at all
    /// yields an empty [`Discovery`].
    pub async fn start_discovery(
        &self,
        output: Output,
        allow_intrusive: bool,
    ) -> Result<Discovery, DiscoveryError> {
        self.config.validate()?;

        let candidates = self.eligible(allow_intrusive);
        let attempted = candidates.len();
        let cancel = self.shutdown.child_token();

        let started = join_all(candidates.iter().map(|descriptor| {
            let output = output.clone();
            let cancel = cancel.child_token();
            async move { self.start_one(descriptor, output, cancel).await }
        }))
        .await;

        let mut workers = Vec::with_capacity(attempted);
        for (descriptor, result) in candidates.iter().zip(started) {
            match result {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    warn!(plugin = descriptor.name, "plugin failed to start: {e}");
                    self.events.emit(DiscoveryEvent::PluginFailedToStart {
                        plugin: descriptor.name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if attempted > 0 && workers.is_empty() {
            error!(attempted, "no discovery plugin could be started");
            return Err(DiscoveryError::NoWorkersStarted { attempted });
        }

        info!(
            started = workers.len(),
            skipped = attempted - workers.len(),
            "discovery running"
        );

        Ok(Discovery {
            workers,
            cancel,
            shutdown_timeout: self.config.shutdown_timeout,
        })
    }

    async fn start_one(
        &self,
        descriptor: &PluginDescriptor,
        output: Output,
        cancel: CancellationToken,
    ) -> Result<WorkerHandle, DiscoveryError> {
        let discoverer = descriptor.instantiate()?;
        let interval = self.config.interval_for(descriptor.name);

        Worker::new(descriptor.name, discoverer, output, interval)?
            .with_validate_timeout(self.config.validate_timeout)
            .with_events(self.events.clone())
            .start(cancel)
            .await
    }
}

/// The set of running workers returned by [`Supervisor::start_discovery`].
#[derive(Debug)]
pub struct Discovery {
    workers: Vec<WorkerHandle>,
    cancel: CancellationToken,
    shutdown_timeout: Duration,
}

impl Discovery {
    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub fn names(&self) -> Vec<&str> {
        self.workers.iter().map(WorkerHandle::name).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Signals every worker to stop without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels every worker and joins them all, aborting stragglers after the
    /// configured timeout.
    pub async fn shutdown(self) -> Vec<(String, WorkerExit)> {
        self.cancel.cancel();

        let timeout = self.shutdown_timeout;
        let mut exits = Vec::with_capacity(self.workers.len());
        let mut pending = tokio::task::JoinSet::new();

        for worker in self.workers {
            pending.spawn(async move {
                let name = worker.name().to_string();
                (name, worker.shutdown(timeout).await)
            });
        }

        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((name, exit)) => {
                    match &exit {
                        WorkerExit::Stopped => info!(plugin = %name, "worker stopped"),
                        other => warn!(plugin = %name, exit = ?other, "worker did not stop cleanly"),
                    }
                    exits.push((name, exit));
                }
                Err(e) => error!("failed to join worker: {e}"),
            }
        }

        exits.sort_by(|a, b| a.0.cmp(&b.0));
        exits
    }

    /// Waits until every worker has ended on its own (fatal defect or panic).
    /// Without cancellation this normally never returns.
    pub async fn join_all(self) -> Vec<(String, WorkerExit)> {
        let mut exits = Vec::with_capacity(self.workers.len());
        for worker in self.workers {
            let name = worker.name().to_string();
            exits.push((name, worker.join().await));
        }
        exits
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
