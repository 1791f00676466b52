//! Downstream sink contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::Notify;

use super::error::SinkError;

/// Health report for a sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkHealth {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SinkHealth {
    pub fn ok() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

/// A downstream consumer of enriched notifications
///
/// Values may carry `Binary` payloads or `BinaryRef`s. Text-only sinks
/// never receive raw bytes when a blob store is configured.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Unique name, used in logs, metrics and dead-letter records
    fn name(&self) -> &str;

    /// True if the sink cannot carry raw bytes
    fn text_only(&self) -> bool {
        false
    }

    /// True if `on_notify_batch` should receive whole batches
    fn supports_batch(&self) -> bool {
        false
    }

    async fn on_notify(&self, notify: &Notify) -> Result<(), SinkError>;

    async fn on_notify_batch(&self, batch: &[Notify]) -> Result<(), SinkError> {
        for notify in batch {
            self.on_notify(notify).await?;
        }
        Ok(())
    }

    async fn health(&self) -> Result<SinkHealth, SinkError> {
        Ok(SinkHealth::ok())
    }

    /// Flush and release resources; called once at shutdown
    async fn drain(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Highest sequence this sink has persisted, if it tracks one
    async fn max_seq(&self) -> Result<Option<u64>, SinkError> {
        Ok(None)
    }
}
