//! Event types for the patch log
//!
//! Events are the immutable mutation records committed to the entity store.
//! The current state is derived by folding them in order.

use serde::{Deserialize, Serialize};

use super::Value;

/// Kind of a mutation, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Create => write!(f, "Create"),
            EventKind::Update => write!(f, "Update"),
            EventKind::Delete => write!(f, "Delete"),
        }
    }
}

/// A single entity mutation
///
/// Wire form: `{"type":"Create","id":"u1","value":1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Set the entity, replacing anything previously known about it
    Create { id: String, value: Value },
    /// Overwrite the entity's value if it exists
    Update { id: String, value: Value },
    /// Remove the entity
    Delete { id: String },
}

impl Event {
    pub fn create(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Event::Create {
            id: id.into(),
            value: value.into(),
        }
    }

    pub fn update(id: impl Into<String>, value: impl Into<Value>) -> Self {
        Event::Update {
            id: id.into(),
            value: value.into(),
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Event::Delete { id: id.into() }
    }

    /// Entity id this event touches
    pub fn id(&self) -> &str {
        match self {
            Event::Create { id, .. } | Event::Update { id, .. } | Event::Delete { id } => id,
        }
    }

    /// Payload, absent for `Delete`
    pub fn value(&self) -> Option<&Value> {
        match self {
            Event::Create { value, .. } | Event::Update { value, .. } => Some(value),
            Event::Delete { .. } => None,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Create { .. } => EventKind::Create,
            Event::Update { .. } => EventKind::Update,
            Event::Delete { .. } => EventKind::Delete,
        }
    }

    /// Serialize event to JSON string (for NDJSON)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize event from JSON string
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization() {
        let event = Event::create("u1", Value::from(json!({"name": "Alice"})));

        let line = event.to_json_line().unwrap();
        assert!(line.contains("\"type\":\"Create\""));
        assert!(line.contains("\"id\":\"u1\""));

        let parsed = Event::from_json_line(&line).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_delete_has_no_value() {
        let line = Event::delete("u1").to_json_line().unwrap();
        assert_eq!(line, r#"{"type":"Delete","id":"u1"}"#);

        let parsed = Event::from_json_line(&line).unwrap();
        assert_eq!(parsed.kind(), EventKind::Delete);
        assert!(parsed.value().is_none());
    }

    #[test]
    fn test_event_with_binary_value() {
        let event = Event::update("img", vec![0u8, 255]);
        let parsed = Event::from_json_line(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(parsed.value().and_then(Value::as_binary), Some(&[0u8, 255][..]));
    }

    #[test]
    fn test_accessors() {
        let event = Event::update("x", 2);
        assert_eq!(event.id(), "x");
        assert_eq!(event.kind(), EventKind::Update);
        assert_eq!(event.value(), Some(&Value::from(2)));
        assert_eq!(EventKind::Update.to_string(), "Update");
    }
}
