//! Bounded per-sink queue with a backpressure policy

use std::collections::VecDeque;

use tokio::time::Instant;

use super::config::BackpressurePolicy;

/// Outcome of offering an item to a full or non-full queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// Held outside the queue until space frees up (`Block`)
    Parked,
    /// The incoming item was discarded (`DropNew`)
    DroppedNew,
    /// The oldest queued item was evicted to make room (`DropOld`)
    DroppedOld,
}

impl Admission {
    pub fn dropped(self) -> bool {
        matches!(self, Admission::DroppedNew | Admission::DroppedOld)
    }
}

struct Entry<T> {
    item: T,
    enqueued_at: Instant,
}

/// FIFO queue holding at most `capacity` items
///
/// Under `Block`, overflow is parked in arrival order and promoted as
/// `take_batch` frees capacity, so nothing is lost and order holds.
pub struct BoundedQueue<T> {
    capacity: usize,
    policy: BackpressurePolicy,
    items: VecDeque<Entry<T>>,
    parked: VecDeque<Entry<T>>,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        Self {
            capacity: capacity.max(1),
            policy,
            items: VecDeque::new(),
            parked: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: T, now: Instant) -> Admission {
        let entry = Entry {
            item,
            enqueued_at: now,
        };

        if !self.parked.is_empty() {
            self.parked.push_back(entry);
            return Admission::Parked;
        }
        if self.items.len() < self.capacity {
            self.items.push_back(entry);
            return Admission::Queued;
        }

        match self.policy {
            BackpressurePolicy::Block => {
                self.parked.push_back(entry);
                Admission::Parked
            }
            BackpressurePolicy::DropNew => Admission::DroppedNew,
            BackpressurePolicy::DropOld => {
                self.items.pop_front();
                self.items.push_back(entry);
                Admission::DroppedOld
            }
        }
    }

    /// Remove up to `max` items from the front, then admit parked items
    pub fn take_batch(&mut self, max: usize) -> Vec<T> {
        let count = max.min(self.items.len());
        let batch = self.items.drain(..count).map(|e| e.item).collect();
        while self.items.len() < self.capacity {
            match self.parked.pop_front() {
                Some(entry) => self.items.push_back(entry),
                None => break,
            }
        }
        batch
    }

    /// When the oldest queued item arrived
    pub fn oldest_enqueued_at(&self) -> Option<Instant> {
        self.items.front().map(|e| e.enqueued_at)
    }

    /// Items in the queue proper
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// True when neither queued nor parked items remain
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.parked.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
