use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::{application::error::ApplicationError, domain::models::file::StoredFile};

/// Byte source for an upload, consumed once.
pub type UploadStream<'a> = dyn AsyncRead + Send + Unpin + 'a;

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Persists `content` under a fresh identifier. Nothing is left behind
    /// when the stream fails part way.
    async fn store(
        &self,
        original_name: &str,
        content: &mut UploadStream<'_>,
    ) -> Result<StoredFile, ApplicationError>;

    /// Path of the stored file, for the transport layer to stream back.
    async fn retrieve(&self, file: &StoredFile) -> Result<PathBuf, ApplicationError>;

    async fn remove(&self, file: &StoredFile) -> Result<(), ApplicationError>;

    async fn list(&self) -> Result<Vec<StoredFile>, ApplicationError>;
}
