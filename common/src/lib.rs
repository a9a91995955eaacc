//! Shared building blocks for the lookout discovery agent.
//!
//! Everything a plugin author or a host process needs to speak the same
//! language as the core: the [`fact`] model, the [`error`] taxonomy, the
//! [`output`] sink and the runtime [`config`].

pub mod config;
pub mod error;
pub mod fact;
pub mod network;
pub mod output;
pub mod utils;

pub use error::DiscoveryError;
pub use fact::{Category, Entity, FactRecord, Value};
pub use output::{FactSink, Output, SinkClosed};
