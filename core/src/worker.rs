//! A [`Discoverer`] bound to an output channel and scheduled as its own task.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lookout_common::config::{DEFAULT_LOOP_INTERVAL, DEFAULT_VALIDATE_TIMEOUT};
use lookout_common::{DiscoveryError, Output};

use crate::discoverer::{Discoverer, RunContext};
use crate::events::{DiscoveryEvent, EventSink};

/// Lifecycle of one worker. Terminal states are never left; nothing restarts
/// a worker automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Still a plain [`Worker`]. Handles never report it.
    NotStarted,
    Validating,
    Running,
    /// Validation failed; the loop never ran.
    Rejected,
    /// Cancelled and wound down cleanly.
    Stopped,
    /// Ended by a fatal defect or a panic.
    Failed,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Stopped | Self::Failed)
    }
}

/// How a started worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Stopped,
    Failed(String),
    Panicked(String),
    /// Did not wind down within the shutdown timeout.
    Aborted,
}

pub struct Worker {
    name: String,
    discoverer: Box<dyn Discoverer>,
    output: Output,
    interval: Duration,
    validate_timeout: Duration,
    events: EventSink,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Worker {
    /// Binds `discoverer` to `output`. Nothing runs until [`Worker::start`].
    pub fn new(
        name: impl Into<String>,
        discoverer: Box<dyn Discoverer>,
        output: Output,
        interval: Duration,
    ) -> Result<Self, DiscoveryError> {
        if interval.is_zero() {
            return Err(DiscoveryError::InvalidInterval(interval));
        }
        Ok(Self {
            name: name.into(),
            discoverer,
            output,
            interval,
            validate_timeout: DEFAULT_VALIDATE_TIMEOUT,
            events: EventSink::disabled(),
        })
    }

    /// Same as [`Worker::new`] with the default 60 second interval.
    pub fn with_default_interval(
        name: impl Into<String>,
        discoverer: Box<dyn Discoverer>,
        output: Output,
    ) -> Result<Self, DiscoveryError> {
        Self::new(name, discoverer, output, DEFAULT_LOOP_INTERVAL)
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Longest time [`Discoverer::validate`] may take before the plugin is
    /// rejected as unmet.
    pub fn with_validate_timeout(mut self, timeout: Duration) -> Self {
        self.validate_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawns the worker task and waits for its one-time validation.
    ///
    /// On success the loop is running and a handle is returned. If validation
    /// fails, panics or outlasts the validation timeout, the loop is never
    /// entered and the error is returned; `probe_once` is guaranteed not to
    /// have been called.
    ///
    /// The task publishes [`DiscoveryEvent::WorkerStarted`] once validated and
    /// [`DiscoveryEvent::WorkerStopped`] when its loop ends, whatever the
    /// reason.
    pub async fn start(self, cancel: CancellationToken) -> Result<WorkerHandle, DiscoveryError> {
        let Worker {
            name,
            mut discoverer,
            output,
            interval,
            validate_timeout,
            events,
        } = self;

        let (state_tx, state_rx) = watch::channel(WorkerState::Validating);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), DiscoveryError>>();

        let mut ctx = RunContext::new(name.clone(), output, interval, cancel.clone(), events.clone());
        let task_events = events.clone();
        let task_name = name.clone();

        let mut join = tokio::spawn(async move {
            if let Err(e) = discoverer.validate().await {
                state_tx.send_replace(WorkerState::Rejected);
                let _ = ready_tx.send(Err(e));
                // Never observed: `start` reports the rejection instead.
                return WorkerExit::Stopped;
            }

            state_tx.send_replace(WorkerState::Running);
            task_events.emit(DiscoveryEvent::WorkerStarted {
                plugin: task_name.clone(),
            });
            let _ = ready_tx.send(Ok(()));
            debug!(plugin = %task_name, "entering run loop");

            let exit = match AssertUnwindSafe(discoverer.run(&mut ctx)).catch_unwind().await {
                Ok(Ok(())) => WorkerExit::Stopped,
                Ok(Err(e)) => {
                    error!(plugin = %task_name, "worker terminated: {e}");
                    WorkerExit::Failed(e.to_string())
                }
                Err(payload) => {
                    let reason = panic_message(payload);
                    error!(plugin = %task_name, "worker panicked: {reason}");
                    WorkerExit::Panicked(reason)
                }
            };

            state_tx.send_replace(match &exit {
                WorkerExit::Stopped => WorkerState::Stopped,
                _ => WorkerState::Failed,
            });
            task_events.emit(DiscoveryEvent::WorkerStopped {
                plugin: task_name,
                exit: exit.clone(),
            });
            exit
        });

        let verdict = match tokio::time::timeout(validate_timeout, ready_rx).await {
            Ok(verdict) => verdict,
            Err(_) => {
                join.abort();
                let _ = (&mut join).await;
                return Err(DiscoveryError::dependency(format!(
                    "validation timed out after {validate_timeout:?}"
                )));
            }
        };

        match verdict {
            Ok(Ok(())) => {
                info!(plugin = %name, interval = ?interval, "worker started");
                Ok(WorkerHandle {
                    name,
                    state: state_rx,
                    cancel,
                    events,
                    join,
                })
            }
            Ok(Err(e)) => {
                let _ = join.await;
                Err(e)
            }
            // The sender was dropped without a verdict: validation panicked.
            Err(_) => {
                let reason = match join.await {
                    Err(e) if e.is_panic() => panic_message(e.into_panic()),
                    _ => "validation aborted".to_string(),
                };
                Err(DiscoveryError::dependency(format!("validation panicked: {reason}")))
            }
        }
    }
}

/// Handle to a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    state: watch::Receiver<WorkerState>,
    cancel: CancellationToken,
    events: EventSink,
    join: JoinHandle<WorkerExit>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        // A dropped sender means the task is gone without saying goodbye.
        if self.state.has_changed().is_err() && !self.state.borrow().is_terminal() {
            return WorkerState::Failed;
        }
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Asks the worker to stop at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the worker task to end.
    pub async fn join(self) -> WorkerExit {
        exit_of(self.join.await)
    }

    /// Cancels, then waits up to `timeout` before aborting the task.
    ///
    /// An aborted task never reports its own end, so the
    /// [`DiscoveryEvent::WorkerStopped`] event is published here instead.
    pub async fn shutdown(mut self, timeout: Duration) -> WorkerExit {
        self.cancel.cancel();
        match tokio::time::timeout(timeout, &mut self.join).await {
            Ok(joined) => exit_of(joined),
            Err(_) => {
                self.join.abort();
                warn!(plugin = %self.name, ?timeout, "worker did not stop in time, aborted");
                self.events.emit(DiscoveryEvent::WorkerStopped {
                    plugin: self.name.clone(),
                    exit: WorkerExit::Aborted,
                });
                WorkerExit::Aborted
            }
        }
    }
}

fn exit_of(joined: Result<WorkerExit, JoinError>) -> WorkerExit {
    match joined {
        Ok(exit) => exit,
        Err(e) if e.is_panic() => WorkerExit::Panicked(panic_message(e.into_panic())),
        Err(_) => WorkerExit::Aborted,
    }
}

pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
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
