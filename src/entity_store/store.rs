//! Entity Store - authoritative normalized history
//!
//! The EntityStore owns the normal-form history, derives state from it,
//! pushes every committed event to subscribers and supports undo/redo
//! through `Committed` handles.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::algebra::{fold, invert, normalize, Normalizer, Patch};
use crate::types::{CommitMeta, Event, State};

use super::law::{Law, LawViolation, PermitAll};
use super::query::EventPattern;
use super::subscribers::{Change, Registry, SharedRegistry, Subscription};

/// Result type for EntityStore operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in EntityStore operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Law(#[from] LawViolation),
}

/// Receipt of a committed patch, owning what is needed to undo it
#[derive(Debug, Clone)]
pub struct Committed {
    submitted: Patch,
    applied: Patch,
    base: State,
}

impl Committed {
    /// The patch as handed to the store
    pub fn patch(&self) -> &Patch {
        &self.submitted
    }

    /// The patch as accepted by the law and merged into history
    pub fn applied(&self) -> &Patch {
        &self.applied
    }

    /// State right before the commit
    pub fn base(&self) -> &State {
        &self.base
    }
}

/// The EntityStore manages the normalized history and its subscribers
///
/// Single writer: commits take `&mut self` and subscriber callbacks run
/// inside the committing call.
pub struct EntityStore {
    history: Vec<Event>,
    normalizer: Normalizer,
    law: Box<dyn Law>,
    subscribers: SharedRegistry,
}

impl EntityStore {
    /// Create a store with the standard normalizer and no validation
    pub fn new() -> Self {
        Self::with_parts(normalize, PermitAll)
    }

    /// Create a store with the standard normalizer and a custom law
    pub fn with_law(law: impl Law + 'static) -> Self {
        Self::with_parts(normalize, law)
    }

    /// Create a store with an injected normalizer and law
    pub fn with_parts(normalizer: Normalizer, law: impl Law + 'static) -> Self {
        Self {
            history: Vec::new(),
            normalizer,
            law: Box::new(law),
            subscribers: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Commit raw events without metadata
    pub fn commit(&mut self, events: impl IntoIterator<Item = Event>) -> StoreResult<()> {
        self.commit_with(events, &CommitMeta::default())
    }

    /// Commit raw events. The input is normalized before the law sees it.
    pub fn commit_with(
        &mut self,
        events: impl IntoIterator<Item = Event>,
        meta: &CommitMeta,
    ) -> StoreResult<()> {
        let patch = Patch::with_normalizer(events, self.normalizer).normalized();
        self.apply(patch, meta).map(|_| ())
    }

    /// Commit a patch without metadata
    pub fn commit_patch(&mut self, patch: &Patch) -> StoreResult<Committed> {
        self.commit_patch_with(patch, &CommitMeta::default())
    }

    /// Commit a patch, returning a handle that can undo it
    pub fn commit_patch_with(&mut self, patch: &Patch, meta: &CommitMeta) -> StoreResult<Committed> {
        let base = self.state();
        let applied = self.apply(patch.clone(), meta)?;
        Ok(Committed {
            submitted: patch.clone(),
            applied,
            base,
        })
    }

    /// Restore the state captured by `committed` by committing the inverse
    /// of what it applied
    pub fn undo(&mut self, committed: &Committed) -> StoreResult<Committed> {
        self.undo_with(committed, &CommitMeta::default())
    }

    pub fn undo_with(&mut self, committed: &Committed, meta: &CommitMeta) -> StoreResult<Committed> {
        let inverse = Patch::with_normalizer(
            invert(committed.applied.events(), &committed.base),
            self.normalizer,
        );
        self.commit_patch_with(&inverse, meta)
    }

    /// Degraded undo for a patch without a handle: inverts against the
    /// current state
    pub fn undo_detached(&mut self, patch: &Patch) -> StoreResult<Committed> {
        let current = self.state();
        let inverse = patch.invert(&current);
        self.commit_patch(&inverse)
    }

    /// Commit the same patch again
    pub fn redo(&mut self, committed: &Committed) -> StoreResult<Committed> {
        self.commit_patch(&committed.submitted)
    }

    pub fn redo_with(&mut self, committed: &Committed, meta: &CommitMeta) -> StoreResult<Committed> {
        self.commit_patch_with(&committed.submitted, meta)
    }

    /// Current state, folded from history
    pub fn state(&self) -> State {
        fold(&self.history)
    }

    /// Current normalized history
    pub fn history(&self) -> &[Event] {
        &self.history
    }

    /// Events in history matching `pattern`
    pub fn matching(&self, pattern: &EventPattern) -> Vec<Event> {
        self.history
            .iter()
            .filter(|event| pattern.matches(event))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Replace history with one `Create` per live id, keeping history order.
    /// Subscribers receive a single `Snapshot`.
    pub fn compact(&mut self) {
        let before = self.history.len();
        let mut live = self.state();
        let mut compacted: Vec<Event> = Vec::with_capacity(live.len());
        for event in &self.history {
            if let Event::Create { id, .. } = event {
                if let Some(value) = live.remove(id) {
                    compacted.push(Event::Create {
                        id: id.clone(),
                        value,
                    });
                }
            }
        }
        self.history = compacted;
        debug!(before, after = self.history.len(), "history compacted");
        self.subscribers
            .lock()
            .notify(&Change::Snapshot, &CommitMeta::default());
    }

    /// Register a subscriber. It is called once immediately with a
    /// `Snapshot`, then with every committed event.
    pub fn subscribe<F>(&self, mut subscriber: F) -> Subscription
    where
        F: FnMut(&Change, &CommitMeta) + Send + 'static,
    {
        subscriber(&Change::Snapshot, &CommitMeta::default());
        let alive = self.subscribers.lock().insert(Box::new(subscriber));
        Subscription::new(alive, &self.subscribers)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn apply(&mut self, patch: Patch, meta: &CommitMeta) -> StoreResult<Patch> {
        let enforced = self.law.enforce(patch).map_err(|violation| {
            warn!(law = %violation.law, reason = %violation.reason, "commit rejected");
            violation
        })?;

        let mut combined = std::mem::take(&mut self.history);
        combined.extend(enforced.events().iter().cloned());
        self.history = (self.normalizer)(&combined);

        debug!(
            events = enforced.len(),
            history = self.history.len(),
            trace_id = meta.trace_id.as_deref().unwrap_or(""),
            "patch committed"
        );

        let mut subscribers = self.subscribers.lock();
        for event in enforced.events() {
            subscribers.notify(&Change::Committed(event.clone()), meta);
        }
        drop(subscribers);

        Ok(enforced)
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("history", &self.history)
            .field("law", &self.law.name())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
