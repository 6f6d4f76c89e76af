//! # Storage Resolver
//!
//! Maps a persisted [`StorageDescriptor`] to something a client can fetch:
//! a path under the upload directory, or a presigned object-store URL with a
//! bounded lifetime. Missing content is [`StorageError::ObjectNotFound`],
//! never a policy error.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::fs;

use super::backend::{BlobStore, RemoteStore};
use super::errors::{StorageError, StorageResult};
use super::local::LocalStore;
use crate::documents::{Document, StorageDescriptor, StorageKind};

/// Default lifetime of a presigned download URL, in seconds
pub const DEFAULT_URL_EXPIRY_SECS: u64 = 300;

/// `Content-Disposition` value offering `file_name` as an attachment.
///
/// Quotes, backslashes and control characters are dropped so the name
/// cannot close the quoted-string or split the header.
pub fn attachment_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .filter(|c| !matches!(c, '"' | '\\') && !c.is_control())
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// Where a document's content can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    LocalPath {
        path: PathBuf,
        file_name: String,
        content_type: String,
    },
    Remote {
        url: String,
        expires_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct StorageResolver {
    local: Arc<LocalStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    url_expiry_secs: u64,
}

impl StorageResolver {
    pub fn new(local: LocalStore, remote: Option<Arc<dyn RemoteStore>>, url_expiry_secs: u64) -> Self {
        Self {
            local: Arc::new(local),
            remote,
            url_expiry_secs,
        }
    }

    pub fn local_only(local: LocalStore) -> Self {
        Self::new(local, None, DEFAULT_URL_EXPIRY_SECS)
    }

    pub fn url_expiry_secs(&self) -> u64 {
        self.url_expiry_secs
    }

    /// Store a new upload, in the object store when one is configured.
    pub async fn upload(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StorageDescriptor> {
        match &self.remote {
            Some(remote) => remote.put(name, data, content_type).await,
            None => self.local.put(name, data, content_type).await,
        }
    }

    /// Delete the content behind `descriptor` from whichever backend holds it.
    pub async fn remove(&self, descriptor: &StorageDescriptor) -> StorageResult<()> {
        match (descriptor.kind, &self.remote) {
            (StorageKind::Local, _) => self.local.delete(&descriptor.key).await,
            (StorageKind::Remote, Some(remote)) => remote.delete(&descriptor.key).await,
            (StorageKind::Remote, None) => Err(StorageError::Internal(
                "no object store configured for remote content".to_string(),
            )),
        }
    }

    /// Resolve a document to a fetchable location.
    pub async fn resolve(&self, document: &Document) -> StorageResult<Location> {
        let descriptor = &document.storage;
        match descriptor.kind {
            StorageKind::Local => {
                let path = self.local.full_path(&descriptor.key)?;
                if !fs::try_exists(&path).await? {
                    return Err(StorageError::ObjectNotFound(descriptor.key.clone()));
                }
                Ok(Location::LocalPath {
                    path,
                    file_name: document.file_name.clone(),
                    content_type: document.content_type.clone(),
                })
            }
            StorageKind::Remote => {
                let remote = self
                    .remote
                    .as_ref()
                    .ok_or_else(|| StorageError::ObjectNotFound(descriptor.key.clone()))?;
                if !remote.exists(&descriptor.key).await? {
                    return Err(StorageError::ObjectNotFound(descriptor.key.clone()));
                }

                let url = remote.presign_download(
                    &descriptor.key,
                    &document.file_name,
                    &document.content_type,
                    self.url_expiry_secs,
                )?;
                Ok(Location::Remote {
                    url,
                    expires_at: Utc::now() + Duration::seconds(self.url_expiry_secs as i64),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{DocumentKind, DocumentStatus};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct FakeBucket {
        keys: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl BlobStore for FakeBucket {
        async fn put(&self, name: &str, _data: Vec<u8>, _ct: &str) -> StorageResult<StorageDescriptor> {
            let key = format!("uploads/{}", name);
            self.keys.lock().unwrap().insert(key.clone());
            Ok(StorageDescriptor { kind: StorageKind::Remote, key })
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.keys.lock().unwrap().remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> StorageResult<bool> {
            Ok(self.keys.lock().unwrap().contains(key))
        }
    }

    impl RemoteStore for FakeBucket {
        fn presign_download(&self, key: &str, file_name: &str, _ct: &str, expires_secs: u64) -> StorageResult<String> {
            Ok(format!("https://bucket.test/{}?name={}&ttl={}", key, file_name, expires_secs))
        }
    }

    fn document(kind: StorageKind, key: &str) -> Document {
        Document {
            id: 7,
            title: "Final".to_string(),
            course_code: "PHYS110".to_string(),
            year: None,
            term: None,
            kind: DocumentKind::Paper,
            notes: None,
            file_name: "final.pdf".to_string(),
            storage: StorageDescriptor { kind, key: key.to_string() },
            content_type: "application/pdf".to_string(),
            status: DocumentStatus::Approved,
            uploader_id: 1,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_local_resolves_existing_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("final.pdf"), b"%PDF").unwrap();
        let resolver = StorageResolver::local_only(LocalStore::new(temp.path()));

        match resolver.resolve(&document(StorageKind::Local, "final.pdf")).await.unwrap() {
            Location::LocalPath { path, file_name, .. } => {
                assert_eq!(path, temp.path().join("final.pdf"));
                assert_eq!(file_name, "final.pdf");
            }
            other => panic!("expected local path, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_local_file_is_gone() {
        let temp = TempDir::new().unwrap();
        let resolver = StorageResolver::local_only(LocalStore::new(temp.path()));

        let result = resolver.resolve(&document(StorageKind::Local, "missing.pdf")).await;
        assert!(matches!(result, Err(StorageError::ObjectNotFound(_))));
    }

    #[tokio::test]
    async fn test_remote_without_backend_is_gone() {
        let temp = TempDir::new().unwrap();
        let resolver = StorageResolver::local_only(LocalStore::new(temp.path()));

        let result = resolver.resolve(&document(StorageKind::Remote, "uploads/final.pdf")).await;
        assert!(matches!(result, Err(StorageError::ObjectNotFound(_))));
    }

    #[tokio::test]
    async fn test_remote_presigns_with_configured_expiry() {
        let temp = TempDir::new().unwrap();
        let bucket = Arc::new(FakeBucket::default());
        let resolver = StorageResolver::new(LocalStore::new(temp.path()), Some(bucket.clone()), 120);

        let stored = resolver
            .upload("final.pdf", b"%PDF".to_vec(), "application/pdf")
            .await
            .unwrap();
        assert_eq!(stored.kind, StorageKind::Remote);

        let before = Utc::now();
        match resolver.resolve(&document(StorageKind::Remote, &stored.key)).await.unwrap() {
            Location::Remote { url, expires_at } => {
                assert!(url.contains("uploads/final.pdf"));
                assert!(url.contains("ttl=120"));
                assert!(expires_at >= before + Duration::seconds(120));
                assert!(expires_at <= Utc::now() + Duration::seconds(120));
            }
            other => panic!("expected remote url, got {:?}", other),
        }

        resolver.remove(&stored).await.unwrap();
        let result = resolver.resolve(&document(StorageKind::Remote, &stored.key)).await;
        assert!(matches!(result, Err(StorageError::ObjectNotFound(_))));
    }

    #[test]
    fn test_attachment_disposition_cannot_break_out() {
        assert_eq!(
            attachment_disposition("exam.pdf"),
            "attachment; filename=\"exam.pdf\""
        );
        assert_eq!(
            attachment_disposition("a\"; filename=\"evil.exe"),
            "attachment; filename=\"a; filename=evil.exe\""
        );
        assert_eq!(
            attachment_disposition("x\\\" y\r\nSet-Cookie: s=1"),
            "attachment; filename=\"x ySet-Cookie: s=1\""
        );

        // Survives as a header value
        let value = attachment_disposition("b\u{7f}ad\0\"name\t.pdf");
        assert!(axum::http::HeaderValue::from_str(&value).is_ok());
        assert_eq!(value, "attachment; filename=\"badname.pdf\"");
    }
}
