//! # Discoverer Contract
//!
//! A discoverer is a long-lived background worker that probes one source of
//! topology information and turns what it finds into [`FactRecord`]s.
//!
//! Plugin authors implement two traits:
//! * [`Discoverer`]: the behavior. Usually just [`Discoverer::probe_once`],
//!   optionally [`Discoverer::validate`], and [`Discoverer::run`] only when the
//!   data source is push-based.
//! * [`Plugin`]: the static metadata (name, capability flags, constructor),
//!   readable before any instance exists so the supervisor can apply its
//!   policy without spawning anything.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lookout_common::{DiscoveryError, FactRecord, Output};

use crate::events::{DiscoveryEvent, EventSink};
use crate::worker::panic_message;

/// Behavior of a discovery worker.
#[async_trait]
pub trait Discoverer: Send {
    /// Pre-flight check, run once before the loop starts.
    ///
    /// Return [`DiscoveryError::DependencyUnmet`] when the host lacks what the
    /// plugin needs; the worker is then never started.
    async fn validate(&mut self) -> Result<(), DiscoveryError> {
        Ok(())
    }

    /// Performs exactly one probe cycle.
    ///
    /// Must not loop internally. Any resource opened here is released before
    /// returning, on every path.
    async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError>;

    /// Runs until cancelled.
    ///
    /// The default polls [`Discoverer::probe_once`] every interval. Only
    /// override this for sources that already block or push (listeners); an
    /// override must still honor [`RunContext::cancelled`].
    async fn run(&mut self, ctx: &mut RunContext) -> Result<(), DiscoveryError> {
        poll_loop(self, ctx).await
    }
}

/// Static description of a plugin type.
pub trait Plugin: Discoverer + Sized + 'static {
    /// Unique registry name, lowercase ASCII letters, digits and dashes.
    const NAME: &'static str;

    /// Actively manipulates network or host state (e.g. scanning). Opt-in only.
    const INTRUSIVE: bool = false;

    /// Only reads pre-existing local state, generating no traffic.
    const PASSIVE: bool = false;

    const DESCRIPTION: &'static str = "";

    /// Builds an instance. Cheap and side-effect free; checks belong in
    /// [`Discoverer::validate`].
    fn create() -> Result<Self, DiscoveryError>;
}

/// What a running worker gets to talk to the outside world.
pub struct RunContext {
    name: String,
    output: Output,
    interval: Duration,
    cancel: CancellationToken,
    events: EventSink,
    cycle: u64,
}

impl RunContext {
    pub fn new(
        name: impl Into<String>,
        output: Output,
        interval: Duration,
        cancel: CancellationToken,
        events: EventSink,
    ) -> Self {
        Self {
            name: name.into(),
            output,
            interval,
            cancel,
            events,
            cycle: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of probe cycles started so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the worker has been asked to stop.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Enqueues `records` in order, stamped with this worker's name.
    ///
    /// A closed output is fatal for the worker: there is nobody left to
    /// report to. A cancelled worker stops waiting on a full output and drops
    /// what it has not handed over yet.
    pub async fn emit(&self, records: Vec<FactRecord>) -> Result<(), DiscoveryError> {
        let total = records.len();
        for (sent, record) in records.into_iter().enumerate() {
            tokio::select! {
                biased;
                put = self.output.put(record.with_source(self.name.as_str())) => {
                    put.map_err(DiscoveryError::fatal)?;
                }
                _ = self.cancel.cancelled() => {
                    debug!(plugin = %self.name, dropped = total - sent, "cancelled while the output was full");
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Logs and publishes a failed cycle.
    pub fn probe_failed(&self, error: &DiscoveryError) {
        warn!(plugin = %self.name, cycle = self.cycle, "probe failed: {error}");
        self.events.emit(DiscoveryEvent::ProbeFailed {
            plugin: self.name.clone(),
            cycle: self.cycle,
            error: error.to_string(),
        });
    }

    /// Sleeps one interval. Returns `false` if cancelled meanwhile.
    pub async fn sleep(&self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.interval) => true,
        }
    }

    fn next_cycle(&mut self) -> u64 {
        self.cycle += 1;
        self.cycle
    }
}

/// The default run loop: probe, emit, sleep, forever.
///
/// A failed cycle is reported and the loop moves on to the next one, whether
/// `probe_once` returned an error or panicked. Only a closed output channel
/// ends the loop with an error.
pub async fn poll_loop<D>(discoverer: &mut D, ctx: &mut RunContext) -> Result<(), DiscoveryError>
where
    D: Discoverer + ?Sized,
{
    loop {
        if ctx.is_cancelled() {
            return Ok(());
        }
        ctx.next_cycle();

        let probe = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Ok(()),
            probe = AssertUnwindSafe(discoverer.probe_once()).catch_unwind() => probe,
        };

        match probe {
            Ok(Ok(records)) => ctx.emit(records).await?,
            Ok(Err(e)) => ctx.probe_failed(&e),
            Err(payload) => {
                let reason = panic_message(payload);
                ctx.probe_failed(&DiscoveryError::probe(format!("probe panicked: {reason}")));
            }
        }

        if !ctx.sleep().await {
            return Ok(());
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_common::output;
    use lookout_common::{Category, Entity};
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    /// Emits one record per cycle carrying the cycle number; fails on the
    /// cycles listed in `fail_on` and panics on those in `panic_on`.
    struct Counter {
        calls: u64,
        fail_on: Vec<u64>,
        panic_on: Vec<u64>,
        probed_at: Vec<Instant>,
    }

    impl Counter {
        fn new(fail_on: Vec<u64>) -> Self {
            Self {
                calls: 0,
                fail_on,
                panic_on: Vec::new(),
                probed_at: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Discoverer for Counter {
        async fn probe_once(&mut self) -> Result<Vec<FactRecord>, DiscoveryError> {
            self.calls += 1;
            self.probed_at.push(Instant::now());
            if self.fail_on.contains(&self.calls) {
                return Err(DiscoveryError::probe("boom"));
            }
            if self.panic_on.contains(&self.calls) {
                let empty: Vec<i64> = Vec::new();
                let _ = empty[self.calls as usize];
            }
            let entity = Entity::new().with("cycle", self.calls as i64);
            Ok(vec![
                FactRecord::new().with(Category::Devices, entity.clone()),
                FactRecord::new().with(Category::Networks, entity),
            ])
        }
    }

    fn context(
        interval: Duration,
        cancel: CancellationToken,
    ) -> (
        RunContext,
        mpsc::UnboundedReceiver<FactRecord>,
        mpsc::UnboundedReceiver<DiscoveryEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        let ctx = RunContext::new(
            "counter",
            output::unbounded(tx),
            interval,
            cancel,
            EventSink::new(ev_tx),
        );
        (ctx, rx, ev_rx)
    }

    fn cycle_of(record: &FactRecord) -> i64 {
        let entity = record
            .devices()
            .first()
            .or_else(|| record.networks().first())
            .unwrap();
        match entity.get("cycle") {
            Some(lookout_common::Value::Int(i)) => *i,
            other => panic!("unexpected cycle attribute {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_are_separated_by_the_interval() {
        let cancel = CancellationToken::new();
        let (mut ctx, mut rx, _events) = context(Duration::from_secs(60), cancel.clone());
        let mut counter = Counter::new(vec![]);

        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(150)).await;
                cancel.cancel();
            })
        };

        poll_loop(&mut counter, &mut ctx).await.unwrap();
        stopper.await.unwrap();

        assert_eq!(counter.calls, 3);
        for pair in counter.probed_at.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(60));
        }

        let mut cycles = Vec::new();
        while let Ok(record) = rx.try_recv() {
            assert_eq!(record.source(), Some("counter"));
            cycles.push(cycle_of(&record));
        }
        assert_eq!(cycles, vec![1, 1, 2, 2, 3, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn a_failed_cycle_does_not_stop_the_loop() {
        let cancel = CancellationToken::new();
        let (mut ctx, mut rx, mut events) = context(Duration::from_secs(1), cancel.clone());
        let mut counter = Counter::new(vec![2]);

        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(3_500)).await;
                cancel.cancel();
            })
        };

        poll_loop(&mut counter, &mut ctx).await.unwrap();
        stopper.await.unwrap();

        assert_eq!(counter.calls, 4);

        let mut cycles = Vec::new();
        while let Ok(record) = rx.try_recv() {
            cycles.push(cycle_of(&record));
        }
        assert_eq!(cycles, vec![1, 1, 3, 3, 4, 4]);

        match events.try_recv().unwrap() {
            DiscoveryEvent::ProbeFailed { plugin, cycle, error } => {
                assert_eq!(plugin, "counter");
                assert_eq!(cycle, 2);
                assert!(error.contains("boom"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_panicking_cycle_does_not_stop_the_loop() {
        let cancel = CancellationToken::new();
        let (mut ctx, mut rx, mut events) = context(Duration::from_secs(1), cancel.clone());
        let mut counter = Counter::new(vec![]);
        counter.panic_on = vec![1];

        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2_500)).await;
                cancel.cancel();
            })
        };

        poll_loop(&mut counter, &mut ctx).await.unwrap();
        stopper.await.unwrap();

        assert_eq!(counter.calls, 3);

        let mut cycles = Vec::new();
        while let Ok(record) = rx.try_recv() {
            cycles.push(cycle_of(&record));
        }
        assert_eq!(cycles, vec![2, 2, 3, 3]);

        match events.try_recv().unwrap() {
            DiscoveryEvent::ProbeFailed { cycle, error, .. } => {
                assert_eq!(cycle, 1);
                assert!(error.contains("index out of bounds"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_releases_a_blocked_emit() {
        let (tx, mut rx) = mpsc::channel::<FactRecord>(1);
        tx.send(FactRecord::new()).await.unwrap();

        let cancel = CancellationToken::new();
        let ctx = RunContext::new(
            "counter",
            std::sync::Arc::new(tx),
            Duration::from_secs(1),
            cancel.clone(),
            EventSink::disabled(),
        );

        let blocked = tokio::spawn(async move { ctx.emit(vec![FactRecord::new(), FactRecord::new()]).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_output_is_fatal() {
        let (mut ctx, rx, _events) = context(Duration::from_secs(1), CancellationToken::new());
        drop(rx);

        let mut counter = Counter::new(vec![]);
        let result = poll_loop(&mut counter, &mut ctx).await;

        assert!(matches!(result, Err(DiscoveryError::FatalWorkerDefect(_))));
        assert_eq!(counter.calls, 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_probes() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (mut ctx, _rx, _events) = context(Duration::from_secs(1), cancel);

        let mut counter = Counter::new(vec![]);
        poll_loop(&mut counter, &mut ctx).await.unwrap();
        assert_eq!(counter.calls, 0);
    }
}
