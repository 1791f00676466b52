//! Push notifications to in-process subscribers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::types::{CommitMeta, Event};

/// What a subscriber observes
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A raw event that was just committed
    Committed(Event),
    /// History was compacted, or the subscriber just registered
    Snapshot,
}

/// Subscriber callback; runs inside the committing call
pub type Subscriber = Box<dyn FnMut(&Change, &CommitMeta) + Send>;

struct Entry {
    alive: Arc<AtomicBool>,
    subscriber: Subscriber,
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    /// Register `subscriber`; the returned flag deregisters it once cleared
    pub(crate) fn insert(&mut self, subscriber: Subscriber) -> Arc<AtomicBool> {
        self.sweep();
        let alive = Arc::new(AtomicBool::new(true));
        self.entries.push(Entry {
            alive: alive.clone(),
            subscriber,
        });
        alive
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_alive()).count()
    }

    /// Invoke every live subscriber; entries cleared meanwhile are removed
    /// after the round
    pub(crate) fn notify(&mut self, change: &Change, meta: &CommitMeta) {
        for entry in self.entries.iter_mut() {
            if entry.is_alive() {
                (entry.subscriber)(change, meta);
            }
        }
        self.sweep();
    }

    fn sweep(&mut self) {
        self.entries.retain(Entry::is_alive);
    }
}

impl Entry {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

/// Handle returned by `EntityStore::subscribe`
///
/// Dropping the handle keeps the subscription alive; call `unsubscribe`
/// to deregister. Safe to call from inside a subscriber callback: the
/// subscriber is skipped from then on and removed once the current
/// notification round ends.
#[derive(Debug)]
pub struct Subscription {
    alive: Arc<AtomicBool>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub(crate) fn new(alive: Arc<AtomicBool>, registry: &SharedRegistry) -> Self {
        Self {
            alive,
            registry: Arc::downgrade(registry),
        }
    }

    /// Stop receiving notifications. Returns false if the store is gone
    /// or the subscription was already removed.
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        if !self.alive.swap(false, Ordering::SeqCst) {
            return false;
        }
        // locked while a round is running; that round sweeps instead
        if let Some(mut registry) = registry.try_lock() {
            registry.sweep();
        }
        true
    }
}
