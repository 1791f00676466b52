//! Binary offload: swap raw bytes in notification values for blob references

use tracing::debug;

use crate::types::{BinaryRef, Notify, Value};

use super::blob::{BlobStore, PutOptions};
use super::error::BlobError;

/// Which binary payloads leave the notification
#[derive(Debug, Clone, Copy)]
pub struct OffloadRule {
    /// Offload every payload (text-only sinks)
    pub force: bool,
    /// Offload payloads longer than this
    pub inline_max_bytes: usize,
}

impl OffloadRule {
    fn selects(&self, payload: &[u8]) -> bool {
        self.force || payload.len() > self.inline_max_bytes
    }
}

/// Return a copy of `batch` where every selected `Binary` payload, at any
/// depth of arrays and maps, is stored in `store` and replaced by its
/// `BinaryRef`. Everything else is untouched.
pub async fn offload_batch(
    batch: &[Notify],
    store: &dyn BlobStore,
    rule: OffloadRule,
) -> Result<Vec<Notify>, BlobError> {
    let mut payloads: Vec<&[u8]> = Vec::new();
    for notify in batch {
        if let Some(value) = notify.value() {
            collect(value, rule, &mut payloads);
        }
    }
    if payloads.is_empty() {
        return Ok(batch.to_vec());
    }

    let mut refs = Vec::with_capacity(payloads.len());
    for payload in &payloads {
        let stored = store.put(payload, PutOptions::default()).await?;
        refs.push(BinaryRef::new(stored.uri, stored.bytes));
    }
    debug!(store = store.name(), blobs = refs.len(), "binary payloads offloaded");

    // replacement walks in the same order as collection
    let mut refs = refs.into_iter();
    let mut out = batch.to_vec();
    for notify in out.iter_mut() {
        if let Some(value) = notify.value_mut() {
            replace(value, rule, &mut refs);
        }
    }
    Ok(out)
}

fn collect<'a>(value: &'a Value, rule: OffloadRule, out: &mut Vec<&'a [u8]>) {
    match value {
        Value::Binary(bytes) if rule.selects(bytes) => out.push(bytes),
        Value::Array(items) => items.iter().for_each(|v| collect(v, rule, out)),
        Value::Map(entries) => entries.values().for_each(|v| collect(v, rule, out)),
        _ => {}
    }
}

fn replace(value: &mut Value, rule: OffloadRule, refs: &mut impl Iterator<Item = BinaryRef>) {
    match value {
        Value::Binary(bytes) if rule.selects(bytes) => {
            if let Some(reference) = refs.next() {
                *value = Value::BinaryRef(reference);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| replace(v, rule, refs)),
        Value::Map(entries) => entries.values_mut().for_each(|v| replace(v, rule, refs)),
        _ => {}
    }
}
