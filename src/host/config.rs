//! Host configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a sink queue does when it is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Hold the notification until the worker frees space
    #[default]
    Block,
    /// Discard the incoming notification
    DropNew,
    /// Evict the oldest queued notification
    DropOld,
}

impl std::fmt::Display for BackpressurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackpressurePolicy::Block => write!(f, "block"),
            BackpressurePolicy::DropNew => write!(f, "drop-new"),
            BackpressurePolicy::DropOld => write!(f, "drop-old"),
        }
    }
}

/// Retry schedule for failed deliveries
///
/// Attempt `k` (0-based) that fails waits `min(base_delay * 2^k, max_delay)`
/// before the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total delivery attempts, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: base_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
        }
    }

    /// Delay after failed attempt `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Configuration for the Host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory for the dead-letter log and the sequence checkpoint
    pub data_dir: PathBuf,
    /// Flush when this many notifications are queued
    pub batch_size: usize,
    /// Flush when the oldest queued notification is this old
    pub batch_interval_ms: u64,
    /// Per-sink queue capacity
    pub queue_capacity: usize,
    pub backpressure: BackpressurePolicy,
    pub retry: RetryPolicy,
    /// Binary payloads larger than this are offloaded to the blob store
    pub inline_max_bytes: usize,
    /// How long shutdown waits for queues to drain
    pub shutdown_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            batch_size: 128,
            batch_interval_ms: 50,
            queue_capacity: 10_000,
            backpressure: BackpressurePolicy::Block,
            retry: RetryPolicy::default(),
            inline_max_bytes: 32 * 1024,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl HostConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_inline_max_bytes(mut self, bytes: usize) -> Self {
        self.inline_max_bytes = bytes;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get path to the dead-letter directory
    pub fn dead_letter_dir(&self) -> PathBuf {
        self.data_dir.join("dead-letter")
    }

    /// Get path to the sequence checkpoint
    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("seq.checkpoint")
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Batch size clamped to at least one
    pub(crate) fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub(crate) fn effective_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.batch_interval(), Duration::from_millis(50));
        assert_eq!(config.queue_capacity, 10_000);
        assert_eq!(config.backpressure, BackpressurePolicy::Block);
        assert_eq!(config.inline_max_bytes, 32768);
        assert_eq!(config.checkpoint_path(), PathBuf::from("data/seq.checkpoint"));
        assert_eq!(config.dead_letter_dir(), PathBuf::from("data/dead-letter"));
    }

    #[test]
    fn test_retry_schedule() {
        let retry = RetryPolicy::default();
        let delays: Vec<u64> = (0..5)
            .map(|k| retry.delay_for_attempt(k).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8]);
        assert_eq!(retry.delay_for_attempt(70), Duration::from_secs(8));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: HostConfig =
            serde_json::from_str(r#"{"backpressure":"drop-old","retry":{"max_attempts":2}}"#)
                .unwrap();
        assert_eq!(config.backpressure, BackpressurePolicy::DropOld);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.batch_size, 128);
    }
}
