//! Utility functions and helpers
//!
//! Atomic file replacement and the clock abstraction used by the host.

pub mod atomic;
pub mod time;

pub use atomic::{atomic_write, AtomicError, AtomicResult};
pub use time::{iso_timestamp, utc_day, Clock, FixedClock, SystemClock};
