//! Per-sink lanes and their worker tasks
//!
//! Each sink owns a lane: a bounded queue fed synchronously by the
//! dispatcher and drained by exactly one worker task. The worker debounces
//! into batches, delivers with retry and dead-letters what cannot be
//! delivered.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify as Wake};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::types::Notify;
use crate::utils::time::{iso_timestamp, utc_day, Clock};

use super::blob::BlobStore;
use super::config::HostConfig;
use super::dead_letter::{DeadLetterLog, DeadLetterRecord};
use super::error::DeliveryError;
use super::metrics::SinkCounters;
use super::offload::{offload_batch, OffloadRule};
use super::queue::{Admission, BoundedQueue};
use super::sink::Sink;

/// Queue, wake signal and counters for one sink
pub(crate) struct Lane {
    pub(crate) sink: Arc<dyn Sink>,
    pub(crate) counters: SinkCounters,
    queue: Mutex<BoundedQueue<Notify>>,
    wake: Wake,
    batch_size: usize,
    /// Size of the batch the worker is delivering, 0 when idle
    in_flight: AtomicUsize,
}

impl Lane {
    pub(crate) fn new(sink: Arc<dyn Sink>, config: &HostConfig) -> Self {
        // sinks without batch support are fed one notification per flush
        let batch_size = if sink.supports_batch() {
            config.effective_batch_size()
        } else {
            1
        };
        Self {
            counters: SinkCounters::new(sink.name()),
            queue: Mutex::new(BoundedQueue::new(
                config.effective_capacity(),
                config.backpressure,
            )),
            wake: Wake::new(),
            batch_size,
            in_flight: AtomicUsize::new(0),
            sink,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.sink.name()
    }

    /// Offer a notification; never blocks
    pub(crate) fn enqueue(&self, notify: Notify) {
        let seq = notify.seq;
        let (admission, queued, parked) = {
            let mut queue = self.queue.lock();
            let admission = queue.push(notify, Instant::now());
            (admission, queue.len(), queue.parked_len())
        };

        match admission {
            Admission::DroppedNew => {
                self.counters.record_dropped(1);
                warn!(sink = %self.name(), seq, "queue full, dropped incoming notification");
            }
            Admission::DroppedOld => {
                self.counters.record_dropped(1);
                warn!(sink = %self.name(), seq, "queue full, evicted oldest notification");
            }
            Admission::Queued | Admission::Parked => {}
        }
        self.counters.set_depth(queued, parked);
        self.wake.notify_one();
    }

    /// Notifications not yet taken by the worker, parked ones included
    pub(crate) fn pending(&self) -> usize {
        let queue = self.queue.lock();
        queue.len() + queue.parked_len()
    }

    /// Notifications taken by the worker whose delivery has not finished
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Deadline of the pending batch, or `None` if it should flush now
    fn flush_deadline(&self, config: &HostConfig) -> Option<Instant> {
        let queue = self.queue.lock();
        if queue.len() >= self.batch_size {
            return None;
        }
        queue
            .oldest_enqueued_at()
            .map(|oldest| oldest + config.batch_interval())
            .filter(|deadline| *deadline > Instant::now())
    }

    fn take_batch(&self) -> Vec<Notify> {
        let mut queue = self.queue.lock();
        let batch = queue.take_batch(self.batch_size);
        self.in_flight.store(batch.len(), Ordering::SeqCst);
        self.counters.set_depth(queue.len(), queue.parked_len());
        batch
    }
}

/// What every worker shares
pub(crate) struct DeliveryContext {
    pub(crate) config: HostConfig,
    pub(crate) blob_store: Option<Arc<dyn BlobStore>>,
    pub(crate) dead_letters: DeadLetterLog,
    pub(crate) clock: Arc<dyn Clock>,
}

/// Worker loop for one lane; returns once shutdown was signalled (or the
/// host dropped) and the lane is empty
pub(crate) async fn run_worker(
    lane: Arc<Lane>,
    ctx: Arc<DeliveryContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(sink = %lane.name(), batch_size = lane.batch_size, "sink worker started");
    let mut draining = *shutdown.borrow();

    loop {
        if lane.is_empty() {
            if draining {
                break;
            }
            tokio::select! {
                _ = lane.wake.notified() => {}
                _ = shutdown.changed() => draining = true,
            }
            continue;
        }

        if !draining {
            if let Some(deadline) = lane.flush_deadline(&ctx.config) {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = lane.wake.notified() => {}
                    _ = shutdown.changed() => draining = true,
                }
                continue;
            }
        }

        let batch = lane.take_batch();
        if !batch.is_empty() {
            deliver(&lane, &ctx, batch).await;
        }
        lane.in_flight.store(0, Ordering::SeqCst);
    }

    info!(sink = %lane.name(), "sink worker stopped");
}

/// Deliver one batch, retrying with backoff, then dead-letter it
async fn deliver(lane: &Lane, ctx: &DeliveryContext, batch: Vec<Notify>) {
    let retry = ctx.config.retry;
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 0;

    let last_error = loop {
        match attempt_delivery(lane, ctx, &batch).await {
            Ok(()) => {
                lane.counters.record_delivered(batch.len());
                debug!(sink = %lane.name(), count = batch.len(), attempt = attempt + 1, "batch delivered");
                return;
            }
            Err(e) if attempt + 1 < max_attempts => {
                let delay = retry.delay_for_attempt(attempt);
                lane.counters.record_retry();
                warn!(
                    sink = %lane.name(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => break e,
        }
    };

    dead_letter(lane, ctx, batch, max_attempts, last_error).await;
}

async fn attempt_delivery(
    lane: &Lane,
    ctx: &DeliveryContext,
    batch: &[Notify],
) -> Result<(), DeliveryError> {
    let offloaded;
    let payload = match &ctx.blob_store {
        Some(store) => {
            let rule = OffloadRule {
                force: lane.sink.text_only(),
                inline_max_bytes: ctx.config.inline_max_bytes,
            };
            offloaded = offload_batch(batch, store.as_ref(), rule).await?;
            offloaded.as_slice()
        }
        None => batch,
    };

    if lane.sink.supports_batch() {
        lane.sink.on_notify_batch(payload).await?;
    } else {
        for notify in payload {
            lane.sink.on_notify(notify).await?;
        }
    }
    Ok(())
}

async fn dead_letter(
    lane: &Lane,
    ctx: &DeliveryContext,
    batch: Vec<Notify>,
    attempts: u32,
    last_error: DeliveryError,
) {
    let now = ctx.clock.now();
    let count = batch.len();
    let first_seq = batch.first().map(|n| n.seq);
    let record = DeadLetterRecord {
        sink: lane.name().to_string(),
        failed_at: iso_timestamp(now),
        attempts,
        error: last_error.to_string(),
        batch,
    };

    lane.counters.record_dead_lettered(count);
    error!(
        sink = %lane.name(),
        count,
        first_seq,
        attempts,
        error = %last_error,
        "batch dead-lettered"
    );

    if let Err(e) = ctx.dead_letters.append(&utc_day(now), &record).await {
        error!(sink = %lane.name(), count, error = %e, "dead-letter write failed, batch lost");
    }
}
