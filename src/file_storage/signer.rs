//! # SigV4 Query-String Signing
//!
//! Presigned URLs for S3-compatible object stores. Every request to the
//! bucket (PUT, HEAD, DELETE and the client-facing GET) is authorised through
//! the query string, so only the `host` header is signed.

use chrono::{DateTime, Utc};
use url::Url;

use super::errors::{StorageError, StorageResult};
use crate::auth::crypto::{hex_encode, hmac_sha256, sha256};

pub const ALGORITHM_IDENTIFIER: &str = "AWS4-HMAC-SHA256";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const KEY_TYPE_IDENTIFIER: &str = "aws4_request";
const SERVICE: &str = "s3";

/// Access credentials for the bucket
#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Signs requests against one bucket
#[derive(Debug, Clone)]
pub struct S3Signer {
    bucket: String,
    region: String,
    /// Custom endpoint (MinIO, R2, ...). Addressed path-style when set.
    endpoint: Option<Url>,
    credentials: S3Credentials,
}

impl S3Signer {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<&str>,
        credentials: S3Credentials,
    ) -> StorageResult<Self> {
        let endpoint = endpoint
            .map(|e| Url::parse(e).map_err(|err| StorageError::Signing(err.to_string())))
            .transpose()?;

        Ok(Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint,
            credentials,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Unsigned URL of `key`
    pub fn object_url(&self, key: &str) -> StorageResult<Url> {
        let encoded_key = percent_encode_path(key);
        let raw = match &self.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.as_str().trim_end_matches('/'),
                percent_encode(&self.bucket),
                encoded_key
            ),
            None if self.region == "us-east-1" => {
                format!("https://{}.s3.amazonaws.com/{}", self.bucket, encoded_key)
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, encoded_key
            ),
        };
        Url::parse(&raw).map_err(|e| StorageError::Signing(e.to_string()))
    }

    /// Presign `method` on `key`. `extra_query` is signed along with the
    /// X-Amz-* parameters (e.g. `response-content-disposition`).
    pub fn presign(
        &self,
        method: &str,
        key: &str,
        expires_secs: u64,
        extra_query: &[(&str, &str)],
        now: DateTime<Utc>,
    ) -> StorageResult<Url> {
        let mut url = self.object_url(key)?;
        let host = host_header(&url)?;

        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = &amz_date[..8];
        let scope = format!("{}/{}/{}/{}", date, self.region, SERVICE, KEY_TYPE_IDENTIFIER);

        let mut params: Vec<(String, String)> = vec![
            ("X-Amz-Algorithm".to_string(), ALGORITHM_IDENTIFIER.to_string()),
            (
                "X-Amz-Credential".to_string(),
                format!("{}/{}", self.credentials.access_key_id, scope),
            ),
            ("X-Amz-Date".to_string(), amz_date.clone()),
            ("X-Amz-Expires".to_string(), expires_secs.to_string()),
            ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
        ];
        if let Some(token) = &self.credentials.session_token {
            params.push(("X-Amz-Security-Token".to_string(), token.clone()));
        }
        for (k, v) in extra_query {
            params.push((k.to_string(), v.to_string()));
        }

        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort();
        let canonical_query = encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
            method,
            url.path(),
            canonical_query,
            host,
            UNSIGNED_PAYLOAD
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM_IDENTIFIER,
            amz_date,
            scope,
            hex_encode(&sha256(canonical_request.as_bytes()))
        );
        let signature = hex_encode(&hmac_sha256(
            &self.signing_key(date),
            string_to_sign.as_bytes(),
        ));

        url.set_query(Some(&format!(
            "{}&X-Amz-Signature={}",
            canonical_query, signature
        )));
        Ok(url)
    }

    fn signing_key(&self, date: &str) -> Vec<u8> {
        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
        hmac_sha256(&k_service, KEY_TYPE_IDENTIFIER.as_bytes())
    }
}

fn host_header(url: &Url) -> StorageResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| StorageError::Signing(format!("no host in {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// RFC 3986 encoding: everything except unreserved characters
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Percent-encode each segment of a key, keeping `/` separators
pub fn percent_encode_path(key: &str) -> String {
    key.split('/')
        .map(percent_encode)
        .collect::<Vec<_>>()
        .join("/")
}
