//! Dead-letter log: batches that exhausted their retries
//!
//! One NDJSON file per UTC day under `<data_dir>/dead-letter/`, one line
//! per failed batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::types::Notify;

use super::error::{HostError, HostResult};

/// One dead-lettered batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub sink: String,
    /// ISO-8601 UTC time of the final failed attempt
    pub failed_at: String,
    pub attempts: u32,
    /// Error of the final attempt
    pub error: String,
    /// The batch as it was enqueued, before any binary offload
    pub batch: Vec<Notify>,
}

/// Append-only, day-partitioned dead-letter files
///
/// Clones share one write lock, so concurrent appends never interleave
/// even when a record spans several `write` calls.
#[derive(Debug, Clone)]
pub struct DeadLetterLog {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl DeadLetterLog {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for `day` (`YYYY-MM-DD`)
    pub fn path_for_day(&self, day: &str) -> PathBuf {
        self.dir.join(format!("{}.ndjson", day))
    }

    /// Append `record` to the file for `day` and sync it
    pub async fn append(&self, day: &str, record: &DeadLetterRecord) -> HostResult<()> {
        let path = self.path_for_day(day);
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HostError::io(&self.dir, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| HostError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| HostError::io(&path, e))?;
        file.sync_all().await.map_err(|e| HostError::io(&path, e))?;
        Ok(())
    }

    /// Read back every record for `day`; unparsable lines are skipped
    pub async fn load_day(&self, day: &str) -> HostResult<Vec<DeadLetterRecord>> {
        let path = self.path_for_day(day);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HostError::io(&path, e)),
        };

        let mut records = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %path.display(),
                    line = line_num + 1,
                    error = %e,
                    "skipping unparsable dead-letter record"
                ),
            }
        }
        Ok(records)
    }

    /// Days that have a dead-letter file, sorted
    pub async fn days(&self) -> HostResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HostError::io(&self.dir, e)),
        };

        let mut days = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HostError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().map(|e| e == "ndjson").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    days.push(stem.to_string());
                }
            }
        }
        days.sort();
        Ok(days)
    }
}
