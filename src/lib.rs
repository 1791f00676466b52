//! Patchlog
//!
//! An embeddable event-sourcing core: a log of entity mutations kept in a
//! canonical minimal form, undo/redo via computed inverses, and reliable
//! fan-out of every committed change to N downstream sinks.
//!
//! # Modules
//!
//! - `types`: Core data structures (Value, Event, Notify, CommitMeta)
//! - `algebra`: Normalization, folding, inversion and `Patch`
//! - `entity_store`: The authoritative history with laws and subscriptions
//! - `host`: Distribution engine (queues, batching, retry, dead letters,
//!   binary offload, durable sequence numbers, metrics)
//! - `utils`: Atomic file writes and the clock
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use patchlog::{EntityStore, Event, Host, HostConfig, Notify, Sink, SinkError};
//!
//! struct Stdout;
//!
//! #[async_trait]
//! impl Sink for Stdout {
//!     fn name(&self) -> &str {
//!         "stdout"
//!     }
//!
//!     async fn on_notify(&self, notify: &Notify) -> Result<(), SinkError> {
//!         println!("{}", serde_json::to_string(notify)?);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut store = EntityStore::new();
//!     let host = Host::builder(HostConfig::new("data"))
//!         .sink(Arc::new(Stdout))
//!         .start(&store)
//!         .await?;
//!
//!     store.commit([Event::create("u1", 1), Event::update("u1", 2)])?;
//!
//!     host.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod algebra;
pub mod entity_store;
pub mod host;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use algebra::{fold, invert, normalize, Patch};
pub use entity_store::{
    Change, Committed, EntityStore, EventPattern, Law, LawViolation, StoreError, StoreResult,
    Subscription,
};
pub use host::{
    BackpressurePolicy, BlobStore, Host, HostConfig, HostError, HostResult, RetryPolicy, Sink,
    SinkError, SinkHealth,
};
pub use types::{BinaryRef, CommitMeta, Event, EventKind, Notify, State, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
