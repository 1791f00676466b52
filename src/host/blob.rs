//! Content-addressed blob storage contract

use async_trait::async_trait;

use super::error::BlobError;

/// Options for `BlobStore::put`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
}

impl PutOptions {
    pub fn content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
        }
    }
}

/// Where a blob landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Canonically `blob:sha256-<hex>`
    pub uri: String,
    pub bytes: u64,
}

/// A blob read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContent {
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

/// Storage for binary payloads offloaded out of notifications
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn name(&self) -> &str;

    async fn put(&self, content: &[u8], options: PutOptions) -> Result<StoredBlob, BlobError>;

    async fn get(&self, uri: &str) -> Result<BlobContent, BlobError>;

    async fn has(&self, uri: &str) -> Result<bool, BlobError> {
        match self.get(uri).await {
            Ok(_) => Ok(true),
            Err(BlobError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, _uri: &str) -> Result<(), BlobError> {
        Err(BlobError::Unsupported {
            store: self.name().to_string(),
            operation: "delete".to_string(),
        })
    }
}
