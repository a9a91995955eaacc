use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use lookout_common::{FactRecord, Output};
use lookout_core::{Supervisor, WorkerExit};

use crate::terminal::print;

/// Records buffered between the workers and stdout. A slow consumer makes the
/// workers wait on `emit`.
const FACT_BUFFER: usize = 256;

/// Runs discovery until ctrl-c, then shuts every worker down.
pub async fn watch(supervisor: &Supervisor) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel::<FactRecord>(FACT_BUFFER);
    let output: Output = Arc::new(tx);

    let discovery = supervisor
        .start_discovery(output, supervisor.config().allow_intrusive)
        .await?;

    if discovery.is_empty() {
        warn!("no plugin is eligible to run");
        return Ok(());
    }
    info!(plugins = %discovery.names().join(", "), "discovery running, ctrl-c to stop");

    let outcome: anyhow::Result<()> = loop {
        tokio::select! {
            record = rx.recv() => match record {
                Some(record) => {
                    if let Err(e) = print::fact_line(&record) {
                        break Err(e);
                    }
                }
                None => {
                    warn!("every worker has ended");
                    break Ok(());
                }
            },
            signal = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping");
                break signal.map_err(Into::into);
            }
        }
    };

    // Keep printing while the workers wind down so none of them waits on a
    // full channel, then flush whatever is still queued.
    let shutdown = discovery.shutdown();
    tokio::pin!(shutdown);
    let exits = loop {
        tokio::select! {
            exits = &mut shutdown => break exits,
            Some(record) = rx.recv(), if outcome.is_ok() => {
                if let Err(e) = print::fact_line(&record) {
                    warn!("cannot print fact record: {e}");
                }
            }
        }
    };

    if outcome.is_ok() {
        while let Ok(record) = rx.try_recv() {
            print::fact_line(&record)?;
        }
    }

    let unclean = exits
        .iter()
        .filter(|(_, exit)| !matches!(exit, WorkerExit::Stopped))
        .count();
    info!(workers = exits.len(), unclean, "discovery stopped");

    outcome
}
