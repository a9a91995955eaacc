//! # Discovery Framework
//!
//! Lifecycle and plugin machinery for background discoverers:
//!
//! * [`discoverer`]: the worker contract plugins implement.
//! * [`worker`]: a discoverer bound to an output and scheduled as a task.
//! * [`registry`]: link-time plugin registration and isolated loading.
//! * [`supervisor`]: the policy gate and the start/stop of the running set.
//! * [`events`]: structured lifecycle events.

pub mod discoverer;
pub mod events;
pub mod registry;
pub mod supervisor;
pub mod worker;

#[doc(hidden)]
pub use inventory;

pub use discoverer::{Discoverer, Plugin, RunContext, poll_loop};
pub use events::{DiscoveryEvent, EventSink};
pub use registry::{PluginDescriptor, PluginRegistry};
pub use supervisor::{Discovery, Supervisor, policy_allows};
pub use worker::{Worker, WorkerExit, WorkerHandle, WorkerState};
