//! Entity Store
//!
//! Owns the normalized event history for a set of entities, derives the
//! current state from it, validates every commit through a `Law` and
//! pushes committed events to in-process subscribers.

mod law;
mod query;
mod store;
mod subscribers;

pub use law::{IdPolicy, Law, LawViolation, PermitAll, ReadOnly};
pub use query::EventPattern;
pub use store::{Committed, EntityStore, StoreError, StoreResult};
pub use subscribers::{Change, Subscriber, Subscription};
