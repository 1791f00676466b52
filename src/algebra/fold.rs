//! State derivation by folding events

use crate::types::{Event, State};

/// Replay a sequence of events from an empty state
pub fn fold(events: &[Event]) -> State {
    apply(State::new(), events)
}

/// Replay a sequence of events on top of an existing state
///
/// `Create` sets, `Update` overwrites only an existing id, `Delete` removes.
pub fn apply(mut state: State, events: &[Event]) -> State {
    for event in events {
        apply_event(&mut state, event);
    }
    state
}

pub(crate) fn apply_event(state: &mut State, event: &Event) {
    match event {
        Event::Create { id, value } => {
            state.insert(id.clone(), value.clone());
        }
        Event::Update { id, value } => {
            if let Some(slot) = state.get_mut(id) {
                *slot = value.clone();
            }
        }
        Event::Delete { id } => {
            state.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_fold_basic() {
        let state = fold(&[
            Event::create("u1", 1),
            Event::update("u1", 2),
            Event::delete("u1"),
            Event::create("u2", 3),
        ]);
        assert_eq!(state.len(), 1);
        assert_eq!(state.get("u2"), Some(&Value::from(3)));
    }

    #[test]
    fn test_update_without_entity_is_ignored() {
        assert!(fold(&[Event::update("x", 1)]).is_empty());
    }

    #[test]
    fn test_apply_on_existing_state() {
        let base = fold(&[Event::create("a", 1)]);
        let state = apply(base, &[Event::update("a", 5)]);
        assert_eq!(state.get("a"), Some(&Value::from(5)));
    }
}
