//! # S3-Compatible Backend

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::backend::{BlobStore, RemoteStore};
use super::errors::{StorageError, StorageResult};
use super::resolver::attachment_disposition;
use super::signer::S3Signer;
use crate::documents::{StorageDescriptor, StorageKind};

/// Key prefix for uploaded documents
pub const UPLOAD_PREFIX: &str = "uploads/";

/// Lifetime of URLs used for our own requests to the bucket
const INTERNAL_URL_EXPIRY_SECS: u64 = 60;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct S3Store {
    signer: S3Signer,
    client: Client,
}

impl S3Store {
    pub fn new(signer: S3Signer) -> StorageResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { signer, client })
    }

    fn internal_url(&self, method: &str, key: &str) -> StorageResult<url::Url> {
        self.signer
            .presign(method, key, INTERNAL_URL_EXPIRY_SECS, &[], Utc::now())
    }

    fn provider_error(op: &str, key: &str, status: StatusCode) -> StorageError {
        StorageError::Provider(format!("{} {} returned {}", op, key, status))
    }
}

#[async_trait]
impl BlobStore for S3Store {
    async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StorageDescriptor> {
        let key = format!("{}{}", UPLOAD_PREFIX, name);
        let url = self.internal_url("PUT", &key)?;

        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::provider_error("PUT", &key, response.status()));
        }

        debug!(bucket = %self.signer.bucket(), key = %key, "object uploaded");
        Ok(StorageDescriptor {
            kind: StorageKind::Remote,
            key,
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let url = self.internal_url("DELETE", key)?;
        let response = self.client.delete(url).send().await?;

        match response.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            s => Err(Self::provider_error("DELETE", key, s)),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let url = self.internal_url("HEAD", key)?;
        let response = self.client.head(url).send().await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(Self::provider_error("HEAD", key, s)),
        }
    }
}

impl RemoteStore for S3Store {
    fn presign_download(
        &self,
        key: &str,
        file_name: &str,
        content_type: &str,
        expires_secs: u64,
    ) -> StorageResult<String> {
        let disposition = attachment_disposition(file_name);
        let url = self.signer.presign(
            "GET",
            key,
            expires_secs,
            &[
                ("response-content-disposition", disposition.as_str()),
                ("response-content-type", content_type),
            ],
            Utc::now(),
        )?;
        Ok(url.to_string())
    }
}
