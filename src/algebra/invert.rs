//! Inverse computation for undo

use crate::types::{Event, State, Value};

use super::fold::apply_event;

/// Compute the events that restore `base` when appended after `events`.
///
/// - `Create(id, v)` → `Delete(id)` if absent before, else `Update(id, prior)`
/// - `Update(id, v)` → `Update(id, prior)` if present before, else nothing
/// - `Delete(id)` → `Create(id, prior)` if present before, else nothing
///
/// Inverses are emitted in reverse order of the original events.
pub fn invert(events: &[Event], base: &State) -> Vec<Event> {
    let mut shadow = base.clone();
    let mut priors: Vec<Option<Value>> = Vec::with_capacity(events.len());

    for event in events {
        priors.push(shadow.get(event.id()).cloned());
        apply_event(&mut shadow, event);
    }

    let mut inverse = Vec::with_capacity(events.len());
    for (event, prior) in events.iter().zip(priors).rev() {
        match (event, prior) {
            (Event::Create { id, .. }, None) => inverse.push(Event::delete(id.clone())),
            (Event::Create { id, .. }, Some(prior)) | (Event::Update { id, .. }, Some(prior)) => {
                inverse.push(Event::update(id.clone(), prior))
            }
            (Event::Delete { id }, Some(prior)) => inverse.push(Event::create(id.clone(), prior)),
            (Event::Update { .. }, None) | (Event::Delete { .. }, None) => {}
        }
    }
    inverse
}
