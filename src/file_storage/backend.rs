//! # Blob Store Trait

use async_trait::async_trait;

use super::errors::StorageResult;
use crate::documents::StorageDescriptor;

/// Backend that holds uploaded document content
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Store `data` under `name` and return the descriptor to persist
    async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StorageDescriptor>;

    /// Delete the content behind `key`. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check whether `key` exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Object store that can hand out time-limited download URLs
pub trait RemoteStore: BlobStore {
    /// Presign a GET for `key` valid for `expires_secs`, with download hints
    fn presign_download(
        &self,
        key: &str,
        file_name: &str,
        content_type: &str,
        expires_secs: u64,
    ) -> StorageResult<String>;
}
