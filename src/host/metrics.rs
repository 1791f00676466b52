//! Delivery metrics
//!
//! Counters live in atomics owned by each sink lane. Every update is also
//! mirrored to the `metrics` facade so an embedding process with a recorder
//! installed exports them. `MetricsSnapshot::render_prometheus` replays a
//! snapshot into a private Prometheus recorder, so it needs no global one.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};

const DELIVERED: &str = "patchlog_delivered_total";
const FAILED: &str = "patchlog_failed_total";
const DROPPED: &str = "patchlog_dropped_total";
const RETRIED: &str = "patchlog_retried_total";
const DEAD_LETTER_BATCHES: &str = "patchlog_dead_letter_batches_total";
const QUEUED: &str = "patchlog_queued";
const PARKED: &str = "patchlog_parked";
const LAST_SEQ: &str = "patchlog_last_seq";

/// (name, help, is_counter) for every per-sink series
const SINK_SERIES: [(&str, &str, bool); 7] = [
    (DELIVERED, "Notifications delivered to the sink", true),
    (FAILED, "Notifications dead-lettered after exhausting retries", true),
    (DROPPED, "Notifications discarded by backpressure", true),
    (RETRIED, "Delivery attempts that were retried", true),
    (DEAD_LETTER_BATCHES, "Batches written to the dead-letter log", true),
    (QUEUED, "Notifications waiting in the sink queue", false),
    (PARKED, "Notifications parked behind a full queue", false),
];

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    for (name, help, is_counter) in SINK_SERIES {
        if is_counter {
            describe_counter!(name, help);
        } else {
            describe_gauge!(name, help);
        }
    }
    describe_gauge!(LAST_SEQ, "Last assigned sequence number");
}

/// Live counters for one sink
#[derive(Debug)]
pub struct SinkCounters {
    sink: String,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
    dead_letter_batches: AtomicU64,
    queued: AtomicU64,
    parked: AtomicU64,
}

impl SinkCounters {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            dead_letter_batches: AtomicU64::new(0),
            queued: AtomicU64::new(0),
            parked: AtomicU64::new(0),
        }
    }

    pub fn record_delivered(&self, count: usize) {
        self.delivered.fetch_add(count as u64, Ordering::Relaxed);
        counter!(DELIVERED, "sink" => self.sink.clone()).increment(count as u64);
    }

    pub fn record_dead_lettered(&self, count: usize) {
        self.failed.fetch_add(count as u64, Ordering::Relaxed);
        self.dead_letter_batches.fetch_add(1, Ordering::Relaxed);
        counter!(FAILED, "sink" => self.sink.clone()).increment(count as u64);
        counter!(DEAD_LETTER_BATCHES, "sink" => self.sink.clone()).increment(1);
    }

    pub fn record_dropped(&self, count: usize) {
        self.dropped.fetch_add(count as u64, Ordering::Relaxed);
        counter!(DROPPED, "sink" => self.sink.clone()).increment(count as u64);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
        counter!(RETRIED, "sink" => self.sink.clone()).increment(1);
    }

    pub fn set_depth(&self, queued: usize, parked: usize) {
        self.queued.store(queued as u64, Ordering::Relaxed);
        self.parked.store(parked as u64, Ordering::Relaxed);
        gauge!(QUEUED, "sink" => self.sink.clone()).set(queued as f64);
        gauge!(PARKED, "sink" => self.sink.clone()).set(parked as f64);
    }

    pub fn snapshot(&self) -> SinkMetrics {
        SinkMetrics {
            sink: self.sink.clone(),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_letter_batches: self.dead_letter_batches.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            parked: self.parked.load(Ordering::Relaxed),
        }
    }
}

pub(crate) fn record_last_seq(seq: u64) {
    gauge!(LAST_SEQ).set(seq as f64);
}

/// Point-in-time metrics for one sink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkMetrics {
    pub sink: String,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
    pub retried: u64,
    pub dead_letter_batches: u64,
    pub queued: u64,
    pub parked: u64,
}

impl SinkMetrics {
    fn series(&self) -> [u64; 7] {
        [
            self.delivered,
            self.failed,
            self.dropped,
            self.retried,
            self.dead_letter_batches,
            self.queued,
            self.parked,
        ]
    }
}

/// Point-in-time metrics for the whole host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub last_seq: u64,
    pub sinks: Vec<SinkMetrics>,
}

impl MetricsSnapshot {
    pub fn sink(&self, name: &str) -> Option<&SinkMetrics> {
        self.sinks.iter().find(|s| s.sink == name)
    }

    /// Sum of a per-sink figure across sinks
    pub fn total(&self, pick: impl Fn(&SinkMetrics) -> u64) -> u64 {
        self.sinks.iter().map(pick).sum()
    }

    /// Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            for sink in &self.sinks {
                for (&(name, _, is_counter), value) in SINK_SERIES.iter().zip(sink.series()) {
                    if is_counter {
                        counter!(name, "sink" => sink.sink.clone()).absolute(value);
                    } else {
                        gauge!(name, "sink" => sink.sink.clone()).set(value as f64);
                    }
                }
            }
            gauge!(LAST_SEQ).set(self.last_seq as f64);
        });

        handle.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = SinkCounters::new("rows");
        counters.record_delivered(3);
        counters.record_dead_lettered(4);
        counters.record_dropped(2);
        counters.record_retry();
        counters.set_depth(5, 1);

        let snap = counters.snapshot();
        assert_eq!(snap.delivered, 3);
        assert_eq!(snap.failed, 4);
        assert_eq!(snap.dead_letter_batches, 1);
        assert_eq!(snap.dropped, 2);
        assert_eq!(snap.retried, 1);
        assert_eq!((snap.queued, snap.parked), (5, 1));
    }

    #[test]
    fn test_render_prometheus() {
        let snapshot = MetricsSnapshot {
            last_seq: 9,
            sinks: vec![
                SinkMetrics {
                    sink: "rows".into(),
                    delivered: 7,
                    ..Default::default()
                },
                SinkMetrics {
                    sink: "stream".into(),
                    dropped: 1,
                    ..Default::default()
                },
            ],
        };

        let text = snapshot.render_prometheus();
        assert!(text.contains("# TYPE patchlog_delivered_total counter\n"));
        assert!(text.contains("# HELP patchlog_delivered_total Notifications delivered to the sink\n"));
        assert!(text.contains("patchlog_delivered_total{sink=\"rows\"} 7\n"));
        assert!(text.contains("patchlog_dropped_total{sink=\"stream\"} 1\n"));
        assert!(text.contains("# TYPE patchlog_queued gauge\n"));

        let last_seq = text
            .lines()
            .find_map(|line| line.strip_prefix("patchlog_last_seq "))
            .and_then(|value| value.parse::<f64>().ok());
        assert_eq!(last_seq, Some(9.0));
        assert_eq!(snapshot.total(|s| s.delivered + s.dropped), 8);
    }
}
