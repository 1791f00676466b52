//! Immutable, composable event sequences

use std::sync::Arc;

use crate::types::{Event, State};

use super::invert::invert;
use super::normalize::{normalize, Normalizer};

/// Immutable sequence of events that can be composed, normalized and inverted
///
/// Cloning is cheap: the events are shared.
#[derive(Clone)]
pub struct Patch {
    events: Arc<[Event]>,
    normalizer: Normalizer,
}

impl Patch {
    /// Create a patch using the standard normalizer
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self::with_normalizer(events, normalize)
    }

    /// Create a patch with a custom normalizer
    pub fn with_normalizer(events: impl IntoIterator<Item = Event>, normalizer: Normalizer) -> Self {
        Self {
            events: events.into_iter().collect(),
            normalizer,
        }
    }

    /// Raw events, exactly as supplied
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn normalizer(&self) -> Normalizer {
        self.normalizer
    }

    /// Normal form of the underlying events
    pub fn normal_form(&self) -> Vec<Event> {
        (self.normalizer)(&self.events)
    }

    /// A patch whose raw events are this patch's normal form
    pub fn normalized(&self) -> Patch {
        Self::with_normalizer(self.normal_form(), self.normalizer)
    }

    /// Concatenate with `other` and normalize the result
    pub fn compose(&self, other: &Patch) -> Patch {
        let combined: Vec<Event> = self
            .events
            .iter()
            .chain(other.events.iter())
            .cloned()
            .collect();
        Self::with_normalizer((self.normalizer)(&combined), self.normalizer)
    }

    /// Patch that undoes this one's normal form relative to `base`
    pub fn invert(&self, base: &State) -> Patch {
        Self::with_normalizer(invert(&self.normal_form(), base), self.normalizer)
    }
}

impl std::fmt::Debug for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patch").field("events", &self.events).finish()
    }
}

impl From<Vec<Event>> for Patch {
    fn from(events: Vec<Event>) -> Self {
        Patch::new(events)
    }
}

impl From<Event> for Patch {
    fn from(event: Event) -> Self {
        Patch::new([event])
    }
}
