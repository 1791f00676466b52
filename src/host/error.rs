//! Host error types

use std::path::PathBuf;

use thiserror::Error;

use crate::utils::AtomicError;

/// Result type for Host operations
pub type HostResult<T> = Result<T, HostError>;

/// Errors that can occur in Host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Atomic(#[from] AtomicError),
}

impl HostError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HostError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure reported by a sink
#[derive(Debug, Clone, Error)]
#[error("sink error: {message}")]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::new(e.to_string())
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::new(e.to_string())
    }
}

/// Failure reported by a blob store
#[derive(Debug, Clone, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob store '{store}' does not support {operation}")]
    Unsupported { store: String, operation: String },

    #[error("blob store error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for BlobError {
    fn from(e: std::io::Error) -> Self {
        BlobError::Backend(e.to_string())
    }
}

/// Why a single delivery attempt failed
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("binary offload failed: {0}")]
    Blob(#[from] BlobError),
}
