//! # Output Boundary
//!
//! Discoverers push [`FactRecord`]s into a [`FactSink`]. The sink is owned by
//! the host process and shared by every worker through an [`Output`] handle;
//! synchronization is the sink's business, never the plugin author's.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::{Sender, UnboundedSender};

use crate::fact::FactRecord;

/// The consumer side has gone away. Nothing a worker can do about it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("output channel closed")]
pub struct SinkClosed;

/// Anything that accepts fact records from many concurrent producers.
#[async_trait]
pub trait FactSink: Send + Sync {
    async fn put(&self, record: FactRecord) -> Result<(), SinkClosed>;
}

/// Shared, non-owning (from a worker's point of view) handle to the sink.
pub type Output = Arc<dyn FactSink>;

#[async_trait]
impl FactSink for UnboundedSender<FactRecord> {
    async fn put(&self, record: FactRecord) -> Result<(), SinkClosed> {
        self.send(record).map_err(|_| SinkClosed)
    }
}

/// Bounded channels apply backpressure: a full channel suspends the worker
/// until the consumer catches up.
#[async_trait]
impl FactSink for Sender<FactRecord> {
    async fn put(&self, record: FactRecord) -> Result<(), SinkClosed> {
        self.send(record).await.map_err(|_| SinkClosed)
    }
}

/// Wraps an unbounded tokio sender as a shared [`Output`].
pub fn unbounded(tx: UnboundedSender<FactRecord>) -> Output {
    Arc::new(tx)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
