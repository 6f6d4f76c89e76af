//! # Local Filesystem Backend

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::backend::BlobStore;
use super::errors::{StorageError, StorageResult};
use crate::documents::{StorageDescriptor, StorageKind};

/// Upload directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a new local store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for `key`. Keys are plain relative paths; anything
    /// that could escape the root is rejected.
    pub fn full_path(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<StorageDescriptor> {
        let full_path = self.full_path(name)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, data).await?;

        Ok(StorageDescriptor {
            kind: StorageKind::Local,
            key: name.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let full_path = self.full_path(key)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let full_path = self.full_path(key)?;
        Ok(fs::try_exists(&full_path).await?)
    }
}
