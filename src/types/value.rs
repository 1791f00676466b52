//! Entity payload values
//!
//! `Value` is the closed payload type carried by `Create`/`Update` events.
//! It mirrors JSON plus two distinguished variants for binary content:
//! raw bytes (`Binary`) and a content-addressed pointer (`BinaryRef`).
//!
//! # Wire form
//!
//! ```text
//! Binary     → {"kind":"bytes","base64":"AQID"}
//! BinaryRef  → {"kind":"blob","uri":"blob:sha256-…","bytes":2048,"contentType":"image/png"}
//! ```
//!
//! Objects with exactly these shapes decode back into the binary variants;
//! every other object decodes as a `Map`.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// URI scheme prefix for content-addressed blobs
pub const BLOB_URI_PREFIX: &str = "blob:sha256-";

/// Content-addressed pointer to a blob held by a `BlobStore`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "BinaryRefWire", try_from = "BinaryRefWire")]
pub struct BinaryRef {
    /// e.g. `blob:sha256-<64 hex>`
    pub uri: String,
    /// Size of the referenced content in bytes
    pub bytes: u64,
    /// e.g. `image/png`
    pub content_type: Option<String>,
}

impl BinaryRef {
    /// Create a reference without content type
    pub fn new(uri: impl Into<String>, bytes: u64) -> Self {
        Self {
            uri: uri.into(),
            bytes,
            content_type: None,
        }
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Check that the URI is a canonical `blob:sha256-<64 lowercase hex>` address
    pub fn is_well_formed(&self) -> bool {
        match self.uri.strip_prefix(BLOB_URI_PREFIX) {
            Some(hex) => {
                hex.len() == 64
                    && hex
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            }
            None => false,
        }
    }
}

/// Compute the canonical content address for `content`
pub fn content_uri(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    format!("{}{}", BLOB_URI_PREFIX, hex::encode(digest))
}

#[derive(Serialize, Deserialize)]
struct BinaryRefWire {
    kind: String,
    uri: String,
    bytes: u64,
    #[serde(
        rename = "contentType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    content_type: Option<String>,
}

impl From<BinaryRef> for BinaryRefWire {
    fn from(r: BinaryRef) -> Self {
        Self {
            kind: "blob".to_string(),
            uri: r.uri,
            bytes: r.bytes,
            content_type: r.content_type,
        }
    }
}

impl TryFrom<BinaryRefWire> for BinaryRef {
    type Error = String;

    fn try_from(wire: BinaryRefWire) -> Result<Self, Self::Error> {
        if wire.kind != "blob" {
            return Err(format!("expected kind \"blob\", found \"{}\"", wire.kind));
        }
        Ok(Self {
            uri: wire.uri,
            bytes: wire.bytes,
            content_type: wire.content_type,
        })
    }
}

/// Payload of an entity
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Raw binary payload
    Binary(Vec<u8>),
    /// Binary payload offloaded to a blob store
    BinaryRef(BinaryRef),
}

impl Value {
    /// Build a map value from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_binary_ref(&self) -> Option<&BinaryRef> {
        match self {
            Value::BinaryRef(r) => Some(r),
            _ => None,
        }
    }

    /// Look up a key of a map value
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// True if a raw `Binary` payload appears anywhere inside this value
    pub fn contains_binary(&self) -> bool {
        match self {
            Value::Binary(_) => true,
            Value::Array(items) => items.iter().any(Value::contains_binary),
            Value::Map(entries) => entries.values().any(Value::contains_binary),
            _ => false,
        }
    }

    /// Convert to plain JSON; binary variants use their wire objects
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Binary(bytes) => serde_json::json!({
                "kind": "bytes",
                "base64": BASE64.encode(bytes),
            }),
            Value::BinaryRef(r) => {
                let mut obj = serde_json::json!({
                    "kind": "blob",
                    "uri": r.uri,
                    "bytes": r.bytes,
                });
                if let Some(ct) = &r.content_type {
                    obj["contentType"] = serde_json::Value::String(ct.clone());
                }
                obj
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                if let Some(bytes) = decode_bytes_object(&obj) {
                    return Value::Binary(bytes);
                }
                if let Some(r) = decode_blob_object(&obj) {
                    return Value::BinaryRef(r);
                }
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

fn decode_bytes_object(obj: &serde_json::Map<String, serde_json::Value>) -> Option<Vec<u8>> {
    if obj.len() != 2 || obj.get("kind")?.as_str()? != "bytes" {
        return None;
    }
    BASE64.decode(obj.get("base64")?.as_str()?).ok()
}

fn decode_blob_object(obj: &serde_json::Map<String, serde_json::Value>) -> Option<BinaryRef> {
    if obj.get("kind")?.as_str()? != "blob" {
        return None;
    }
    let allowed = ["kind", "uri", "bytes", "contentType"];
    if obj.keys().any(|k| !allowed.contains(&k.as_str())) {
        return None;
    }
    let content_type = match obj.get("contentType") {
        None => None,
        Some(ct) => Some(ct.as_str()?.to_string()),
    };
    Some(BinaryRef {
        uri: obj.get("uri")?.as_str()?.to_string(),
        bytes: obj.get("bytes")?.as_u64()?,
        content_type,
    })
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => items.serialize(serializer),
            Value::Map(entries) => entries.serialize(serializer),
            Value::Binary(bytes) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("kind", "bytes")?;
                map.serialize_entry("base64", &BASE64.encode(bytes))?;
                map.end()
            }
            Value::BinaryRef(r) => r.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

impl From<BinaryRef> for Value {
    fn from(r: BinaryRef) -> Self {
        Value::BinaryRef(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}
