//! Data types for the patch log
//!
//! This module contains the core data structures shared by the algebra,
//! the entity store and the distribution host.

mod event;
mod notify;
mod value;

use std::collections::BTreeMap;

pub use event::{Event, EventKind};
pub use notify::{CommitMeta, Notify, NotifyBody, SCHEMA_VERSION};
pub use value::{content_uri, BinaryRef, Value, BLOB_URI_PREFIX};

/// Materialized state: entity id → current value
pub type State = BTreeMap<String, Value>;
