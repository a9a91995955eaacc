use tokio::task::JoinSet;
use tracing::{error, info, warn};

use lookout_common::{DiscoveryError, FactRecord};
use lookout_core::{PluginDescriptor, Supervisor};

use crate::terminal::print;

/// Runs a single probe cycle of every eligible plugin concurrently and prints
/// what came back.
pub async fn once(supervisor: &Supervisor) -> anyhow::Result<()> {
    let cfg = supervisor.config();
    cfg.validate()?;

    let candidates = supervisor.eligible(cfg.allow_intrusive);
    let attempted = candidates.len();
    if attempted == 0 {
        warn!("no plugin is eligible to run");
        return Ok(());
    }

    let mut probes = JoinSet::new();
    for descriptor in candidates {
        probes.spawn(async move {
            let name = descriptor.name;
            (name, probe(descriptor).await)
        });
    }

    let mut succeeded = 0usize;
    let mut printed = 0usize;
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok((name, Ok(records))) => {
                succeeded += 1;
                for record in records {
                    print::fact_line(&record.with_source(name))?;
                    printed += 1;
                }
            }
            Ok((name, Err(e))) => warn!(plugin = name, "{e}"),
            Err(e) => error!("plugin probe task failed: {e}"),
        }
    }

    if succeeded == 0 {
        return Err(DiscoveryError::NoWorkersStarted { attempted }.into());
    }

    info!(plugins = succeeded, records = printed, "single pass finished");
    Ok(())
}

async fn probe(descriptor: PluginDescriptor) -> Result<Vec<FactRecord>, DiscoveryError> {
    let mut discoverer = descriptor.instantiate()?;
    discoverer.validate().await?;
    discoverer.probe_once().await
}
