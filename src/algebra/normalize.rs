//! Normal form compaction

use std::collections::HashMap;

use crate::types::Event;

/// Injectable normalization function
pub type Normalizer = fn(&[Event]) -> Vec<Event>;

struct Record<'a> {
    create: &'a Event,
    update: Option<&'a Event>,
    last_touch: usize,
}

/// Compact an event sequence into its minimal equivalent form.
///
/// - An `Update` without a live `Create` is discarded.
/// - A `Delete` drops everything known about the id so far.
/// - `Create → Update* → Delete` collapses to nothing.
/// - Consecutive `Update`s collapse to the last one.
///
/// Ids are emitted in order of their most recent touch, each as
/// `Create` optionally followed by one `Update`.
pub fn normalize(events: &[Event]) -> Vec<Event> {
    let mut records: HashMap<&str, Record<'_>> = HashMap::new();

    for (index, event) in events.iter().enumerate() {
        match event {
            Event::Create { id, .. } => {
                records.insert(
                    id.as_str(),
                    Record {
                        create: event,
                        update: None,
                        last_touch: index,
                    },
                );
            }
            Event::Update { id, .. } => {
                if let Some(record) = records.get_mut(id.as_str()) {
                    record.update = Some(event);
                    record.last_touch = index;
                }
            }
            Event::Delete { id } => {
                records.remove(id.as_str());
            }
        }
    }

    let mut ordered: Vec<Record<'_>> = records.into_values().collect();
    ordered.sort_unstable_by_key(|r| r.last_touch);

    let mut result = Vec::with_capacity(ordered.len() * 2);
    for record in ordered {
        result.push(record.create.clone());
        if let Some(update) = record.update {
            result.push(update.clone());
        }
    }
    result
}

/// True if `events` already satisfies the normal form invariants
pub fn is_normal_form(events: &[Event]) -> bool {
    normalize(events) == events
}
