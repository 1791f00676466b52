//! Distribution engine
//!
//! Turns every change committed to an `EntityStore` into an enriched
//! `Notify` and delivers it to N sinks:
//!
//! - one bounded queue and one worker task per sink
//! - backpressure: block, drop-new or drop-old
//! - batching by size and interval
//! - retry with exponential backoff, then a day-partitioned dead-letter log
//! - offload of binary payloads to a `BlobStore`
//! - durable sequence numbering via a checkpoint file

mod blob;
mod config;
mod dead_letter;
mod engine;
mod error;
mod metrics;
mod offload;
mod queue;
mod sequence;
mod sink;
mod worker;

pub use blob::{BlobContent, BlobStore, PutOptions, StoredBlob};
pub use config::{BackpressurePolicy, HostConfig, RetryPolicy};
pub use dead_letter::{DeadLetterLog, DeadLetterRecord};
pub use engine::{Host, HostBuilder, ShutdownReport};
pub use error::{BlobError, DeliveryError, HostError, HostResult, SinkError};
pub use metrics::{describe_metrics, MetricsSnapshot, SinkCounters, SinkMetrics};
pub use offload::{offload_batch, OffloadRule};
pub use queue::{Admission, BoundedQueue};
pub use sequence::{recover_last_seq, Checkpoint, SequenceCounter};
pub use sink::{Sink, SinkHealth};
