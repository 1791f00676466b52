//! Enriched notifications delivered to sinks

use serde::{Deserialize, Serialize};

use super::{Event, Value};

/// Schema version stamped on every notification
pub const SCHEMA_VERSION: u32 = 1;

/// Caller-supplied correlation data threaded through a commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    #[serde(rename = "traceId", default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl CommitMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// What a notification is about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotifyBody {
    Create { id: String, value: Value },
    Update { id: String, value: Value },
    Delete { id: String },
    /// History was compacted, or the receiver just subscribed
    Snapshot,
}

impl From<Event> for NotifyBody {
    fn from(event: Event) -> Self {
        match event {
            Event::Create { id, value } => NotifyBody::Create { id, value },
            Event::Update { id, value } => NotifyBody::Update { id, value },
            Event::Delete { id } => NotifyBody::Delete { id },
        }
    }
}

/// Notification wrapper with sequence and correlation metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notify {
    #[serde(flatten)]
    pub body: NotifyBody,

    /// Globally monotonic, durable across restarts
    pub seq: u64,

    /// ISO-8601 UTC timestamp
    pub ts: String,

    pub version: u32,

    #[serde(rename = "traceId", default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl Notify {
    /// Enrich a committed event
    pub fn event(event: Event, seq: u64, ts: String, meta: &CommitMeta) -> Self {
        Self {
            body: event.into(),
            seq,
            ts,
            version: SCHEMA_VERSION,
            trace_id: meta.trace_id.clone(),
            actor: meta.actor.clone(),
        }
    }

    /// Snapshot marker; carries no correlation metadata
    pub fn snapshot(seq: u64, ts: String) -> Self {
        Self {
            body: NotifyBody::Snapshot,
            seq,
            ts,
            version: SCHEMA_VERSION,
            trace_id: None,
            actor: None,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self.body, NotifyBody::Snapshot)
    }

    pub fn id(&self) -> Option<&str> {
        match &self.body {
            NotifyBody::Create { id, .. }
            | NotifyBody::Update { id, .. }
            | NotifyBody::Delete { id } => Some(id),
            NotifyBody::Snapshot => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.body {
            NotifyBody::Create { value, .. } | NotifyBody::Update { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn value_mut(&mut self) -> Option<&mut Value> {
        match &mut self.body {
            NotifyBody::Create { value, .. } | NotifyBody::Update { value, .. } => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_notify_serialization() {
        let meta = CommitMeta::new().with_trace_id("t-1").with_actor("alice");
        let notify = Notify::event(
            Event::create("u1", 1),
            42,
            "2024-01-01T00:00:00.000Z".to_string(),
            &meta,
        );

        let json = serde_json::to_value(&notify).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "Create",
                "id": "u1",
                "value": 1,
                "seq": 42,
                "ts": "2024-01-01T00:00:00.000Z",
                "version": 1,
                "traceId": "t-1",
                "actor": "alice"
            })
        );

        let parsed: Notify = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, notify);
    }

    #[test]
    fn test_snapshot_shape() {
        let notify = Notify::snapshot(7, "2024-01-01T00:00:00.000Z".to_string());
        let json = serde_json::to_value(&notify).unwrap();
        assert_eq!(
            json,
            json!({"type": "Snapshot", "seq": 7, "ts": "2024-01-01T00:00:00.000Z", "version": 1})
        );
        assert!(notify.is_snapshot());
        assert!(notify.id().is_none());
    }

    #[test]
    fn test_delete_notify_has_no_value() {
        let notify = Notify::event(Event::delete("x"), 1, String::new(), &CommitMeta::new());
        assert_eq!(notify.id(), Some("x"));
        assert!(notify.value().is_none());
    }
}
