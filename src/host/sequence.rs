//! Durable sequence numbering
//!
//! Sequence values are assigned synchronously during enrichment. The last
//! assigned value is published on a watch channel; a background task
//! coalesces updates and rewrites the checkpoint file atomically.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::utils::atomic::{atomic_write, remove_stale_temp};

use super::error::{HostError, HostResult};
use super::sink::Sink;

/// Monotonic sequence counter
#[derive(Debug)]
pub struct SequenceCounter {
    last: AtomicU64,
    published: watch::Sender<u64>,
}

impl SequenceCounter {
    /// Counter whose next value is `last + 1`
    pub fn starting_after(last: u64) -> Self {
        let (published, _) = watch::channel(last);
        Self {
            last: AtomicU64::new(last),
            published,
        }
    }

    /// Assign the next sequence value
    pub fn next(&self) -> u64 {
        let seq = self.last.fetch_add(1, Ordering::SeqCst) + 1;
        self.published.send_if_modified(|current| {
            if seq > *current {
                *current = seq;
                true
            } else {
                false
            }
        });
        seq
    }

    /// Last assigned value (0 if none ever was)
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.published.subscribe()
    }
}

/// The checkpoint file holding the last assigned sequence as a decimal string
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint; `None` if it does not exist
    pub async fn load(&self) -> HostResult<Option<u64>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HostError::io(&self.path, e)),
        };
        content.trim().parse::<u64>().map(Some).map_err(|e| {
            HostError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    pub fn persist(&self, seq: u64) -> HostResult<()> {
        atomic_write(&self.path, &seq.to_string())?;
        Ok(())
    }

    /// `persist` on the blocking pool, logging failures
    pub(crate) async fn persist_logged(&self, seq: u64) {
        let checkpoint = self.clone();
        let outcome = tokio::task::spawn_blocking(move || checkpoint.persist(seq)).await;
        match outcome {
            Ok(Ok(())) => debug!(seq, "checkpoint persisted"),
            Ok(Err(e)) => warn!(seq, error = %e, "checkpoint write failed"),
            Err(e) => warn!(seq, error = %e, "checkpoint task failed"),
        }
    }
}

/// Last sequence value already handed out by a previous run:
/// the maximum of the checkpoint and every sink's `max_seq`
pub async fn recover_last_seq(checkpoint: &Checkpoint, sinks: &[Arc<dyn Sink>]) -> u64 {
    let target = checkpoint.path().to_path_buf();
    match tokio::task::spawn_blocking(move || remove_stale_temp(&target)).await {
        Ok(Ok(removed)) => {
            if removed {
                debug!("removed stale checkpoint temp file");
            }
        }
        Ok(Err(e)) => warn!(error = %e, "could not remove stale checkpoint temp file"),
        Err(e) => warn!(error = %e, "checkpoint cleanup task failed"),
    }
    let mut last = match checkpoint.load().await {
        Ok(value) => value.unwrap_or(0),
        Err(e) => {
            warn!(error = %e, "unreadable sequence checkpoint, treating as 0");
            0
        }
    };

    for sink in sinks {
        match sink.max_seq().await {
            Ok(Some(seq)) => last = last.max(seq),
            Ok(None) => {}
            Err(e) => warn!(sink = %sink.name(), error = %e, "max_seq failed, ignoring"),
        }
    }
    last
}

/// Background task persisting published sequence values until shutdown
pub(crate) fn spawn_checkpointer(
    checkpoint: Checkpoint,
    mut published: watch::Receiver<u64>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = published.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let seq = *published.borrow_and_update();
                    checkpoint.persist_logged(seq).await;
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counter_starts_after_last() {
        let counter = SequenceCounter::starting_after(41);
        assert_eq!(counter.next(), 42);
        assert_eq!(counter.next(), 43);
        assert_eq!(counter.last(), 43);
        assert_eq!(*counter.watch().borrow(), 43);
    }

    #[tokio::test]
    async fn test_checkpoint_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let checkpoint = Checkpoint::new(temp_dir.path().join("seq.checkpoint"));

        assert_eq!(checkpoint.load().await.unwrap(), None);
        checkpoint.persist(12).unwrap();
        assert_eq!(checkpoint.load().await.unwrap(), Some(12));
        assert_eq!(std::fs::read_to_string(checkpoint.path()).unwrap(), "12");
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let checkpoint = Checkpoint::new(temp_dir.path().join("seq.checkpoint"));
        std::fs::write(checkpoint.path(), "not a number").unwrap();
        assert!(checkpoint.load().await.is_err());
    }

    #[tokio::test]
    async fn test_recover_removes_stale_temp_and_reads_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let checkpoint = Checkpoint::new(temp_dir.path().join("seq.checkpoint"));
        checkpoint.persist(30).unwrap();
        let temp = crate::utils::atomic::temp_path(checkpoint.path());
        std::fs::write(&temp, "31").unwrap();

        assert_eq!(recover_last_seq(&checkpoint, &[]).await, 30);
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_recover_ignores_corrupt_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let checkpoint = Checkpoint::new(temp_dir.path().join("seq.checkpoint"));
        std::fs::write(checkpoint.path(), "garbage").unwrap();
        assert_eq!(recover_last_seq(&checkpoint, &[]).await, 0);
    }

    #[tokio::test]
    async fn test_checkpointer_persists_published_values() {
        let temp_dir = TempDir::new().unwrap();
        let checkpoint = Checkpoint::new(temp_dir.path().join("seq.checkpoint"));
        let counter = SequenceCounter::starting_after(0);
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = spawn_checkpointer(checkpoint.clone(), counter.watch(), stop_rx);
        counter.next();
        counter.next();

        let mut persisted = None;
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            persisted = checkpoint.load().await.unwrap();
            if persisted == Some(2) {
                break;
            }
        }
        assert_eq!(persisted, Some(2));

        stop_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
