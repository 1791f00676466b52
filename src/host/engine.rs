//! Host - fans committed changes out to sinks
//!
//! The host subscribes to an `EntityStore`, enriches each change into a
//! `Notify` (sequence, timestamp, schema version, trace/actor) and offers
//! it to every sink lane. Workers deliver in the background; the
//! committing caller never waits on a sink.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::entity_store::{Change, EntityStore, Subscription};
use crate::types::{CommitMeta, Notify};
use crate::utils::time::{iso_timestamp, Clock, SystemClock};

use super::blob::BlobStore;
use super::config::HostConfig;
use super::dead_letter::DeadLetterLog;
use super::error::{HostError, HostResult};
use super::metrics::{describe_metrics, record_last_seq, MetricsSnapshot};
use super::sequence::{recover_last_seq, spawn_checkpointer, Checkpoint, SequenceCounter};
use super::sink::{Sink, SinkHealth};
use super::worker::{run_worker, DeliveryContext, Lane};

/// Outcome of `Host::shutdown`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub last_seq: u64,
    /// Notifications queued or mid-delivery when the shutdown timeout hit
    pub abandoned: usize,
    /// True if some worker had to be aborted
    pub timed_out: bool,
    /// Sinks whose `drain()` failed
    pub drain_failures: Vec<String>,
}

/// Builder for `Host`
pub struct HostBuilder {
    config: HostConfig,
    sinks: Vec<Arc<dyn Sink>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    clock: Arc<dyn Clock>,
}

impl HostBuilder {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
            blob_store: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Enable binary offload through `store`
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Recover the sequence, spawn workers and subscribe to `store`
    ///
    /// Subscribing immediately emits a `Snapshot` notification to every
    /// sink.
    pub async fn start(self, store: &EntityStore) -> HostResult<Host> {
        let HostBuilder {
            config,
            sinks,
            blob_store,
            clock,
        } = self;

        tokio::fs::create_dir_all(config.data_dir())
            .await
            .map_err(|e| HostError::io(config.data_dir(), e))?;
        describe_metrics();

        let checkpoint = Checkpoint::new(config.checkpoint_path());
        let last_seq = recover_last_seq(&checkpoint, &sinks).await;
        let sequence = Arc::new(SequenceCounter::starting_after(last_seq));
        record_last_seq(last_seq);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let checkpointer =
            spawn_checkpointer(checkpoint.clone(), sequence.watch(), shutdown_rx.clone());

        let mut names: Vec<&str> = sinks.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != sinks.len() {
            warn!("sink names are not unique, metrics and dead letters will be ambiguous");
        }

        let lanes: Vec<Arc<Lane>> = sinks
            .into_iter()
            .map(|sink| Arc::new(Lane::new(sink, &config)))
            .collect();

        let ctx = Arc::new(DeliveryContext {
            dead_letters: DeadLetterLog::new(config.dead_letter_dir()),
            config: config.clone(),
            blob_store,
            clock: clock.clone(),
        });
        let workers = lanes
            .iter()
            .map(|lane| tokio::spawn(run_worker(lane.clone(), ctx.clone(), shutdown_rx.clone())))
            .collect();

        let dispatcher = Dispatcher {
            lanes: lanes.clone(),
            sequence: sequence.clone(),
            clock,
        };
        let subscription = store.subscribe(move |change, meta| dispatcher.dispatch(change, meta));

        info!(
            sinks = lanes.len(),
            last_seq,
            backpressure = %config.backpressure,
            offload = ctx.blob_store.is_some(),
            "host started"
        );

        Ok(Host {
            config,
            lanes,
            sequence,
            checkpoint,
            shutdown_tx,
            workers,
            checkpointer: Some(checkpointer),
            subscription: Some(subscription),
        })
    }
}

/// Enriches store changes and offers them to every lane
struct Dispatcher {
    lanes: Vec<Arc<Lane>>,
    sequence: Arc<SequenceCounter>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    fn dispatch(&self, change: &Change, meta: &CommitMeta) {
        let seq = self.sequence.next();
        let ts = iso_timestamp(self.clock.now());
        let notify = match change {
            Change::Committed(event) => Notify::event(event.clone(), seq, ts, meta),
            Change::Snapshot => Notify::snapshot(seq, ts),
        };
        record_last_seq(seq);

        for lane in &self.lanes {
            lane.enqueue(notify.clone());
        }
    }
}

/// Running distribution engine
pub struct Host {
    config: HostConfig,
    lanes: Vec<Arc<Lane>>,
    sequence: Arc<SequenceCounter>,
    checkpoint: Checkpoint,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    checkpointer: Option<JoinHandle<()>>,
    subscription: Option<Subscription>,
}

impl Host {
    pub fn builder(config: HostConfig) -> HostBuilder {
        HostBuilder::new(config)
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Last assigned sequence value
    pub fn last_seq(&self) -> u64 {
        self.sequence.last()
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.lanes.iter().map(|l| l.name().to_string()).collect()
    }

    /// Notifications offered to sinks but not yet taken by their workers
    pub fn pending(&self) -> usize {
        self.lanes.iter().map(|l| l.pending()).sum()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            last_seq: self.sequence.last(),
            sinks: self.lanes.iter().map(|l| l.counters.snapshot()).collect(),
        }
    }

    /// Metrics in Prometheus text exposition format
    pub fn render_metrics(&self) -> String {
        self.metrics().render_prometheus()
    }

    /// Health of every sink; errors are reported as failing
    pub async fn health(&self) -> Vec<(String, SinkHealth)> {
        let checks = self.lanes.iter().map(|lane| async move {
            let health = match lane.sink.health().await {
                Ok(health) => health,
                Err(e) => SinkHealth::failing(e.to_string()),
            };
            (lane.name().to_string(), health)
        });
        join_all(checks).await
    }

    /// Stop accepting changes, drain queues, call every sink's `drain()`
    /// and persist the final sequence checkpoint
    pub async fn shutdown(mut self) -> ShutdownReport {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        let _ = self.shutdown_tx.send(true);

        let deadline = Instant::now() + self.config.shutdown_timeout();
        let mut timed_out = false;
        for mut worker in std::mem::take(&mut self.workers) {
            if tokio::time::timeout_at(deadline, &mut worker).await.is_err() {
                worker.abort();
                timed_out = true;
            }
        }
        let abandoned = self.pending()
            + self.lanes.iter().map(|l| l.in_flight()).sum::<usize>();
        if timed_out {
            warn!(abandoned, "shutdown timed out, aborted sink workers");
        }

        let mut drain_failures = Vec::new();
        for lane in &self.lanes {
            if let Err(e) = lane.sink.drain().await {
                warn!(sink = %lane.name(), error = %e, "sink drain failed");
                drain_failures.push(lane.name().to_string());
            }
        }

        if let Some(checkpointer) = self.checkpointer.take() {
            let _ = checkpointer.await;
        }
        let last_seq = self.sequence.last();
        self.checkpoint.persist_logged(last_seq).await;

        info!(last_seq, abandoned, "host stopped");
        ShutdownReport {
            last_seq,
            abandoned,
            timed_out,
            drain_failures,
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        // workers flush what is queued and exit once the signal lands
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        let _ = self.shutdown_tx.send(true);
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("sinks", &self.sink_names())
            .field("last_seq", &self.last_seq())
            .finish()
    }
}
