//! Structural queries over history

use crate::types::{Event, EventKind, Value};

/// Partial match on event fields; `None` matches anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPattern {
    pub kind: Option<EventKind>,
    pub id: Option<String>,
    pub value: Option<Value>,
}

impl EventPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(kind) = self.kind {
            if event.kind() != kind {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if event.id() != id {
                return false;
            }
        }
        match &self.value {
            Some(value) => event.value() == Some(value),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_matches_all() {
        assert!(EventPattern::new().matches(&Event::delete("x")));
    }

    #[test]
    fn test_pattern_fields() {
        let event = Event::update("u1", 2);
        assert!(EventPattern::new().kind(EventKind::Update).matches(&event));
        assert!(!EventPattern::new().kind(EventKind::Create).matches(&event));
        assert!(EventPattern::new().id("u1").value(2).matches(&event));
        assert!(!EventPattern::new().value(3).matches(&event));
        assert!(!EventPattern::new().value(Value::Null).matches(&Event::delete("u1")));
    }
}
