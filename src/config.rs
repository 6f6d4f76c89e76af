//! # Service Configuration
//!
//! One [`AppConfig`] is built at startup from an optional JSON file plus
//! environment overrides, then handed to every component. Nothing outside
//! this module reads the process environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entitlement::DEFAULT_FREE_DOC_LIMIT;
use crate::file_storage::DEFAULT_URL_EXPIRY_SECS;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins (empty: any origin)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Request body cap, mostly relevant for uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_free_doc_limit")]
    pub free_doc_limit: u32,
}

fn default_free_doc_limit() -> u32 {
    DEFAULT_FREE_DOC_LIMIT
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_doc_limit: default_free_doc_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl")]
    pub access_token_ttl_minutes: i64,

    #[serde(default = "default_token_party")]
    pub issuer: String,

    #[serde(default = "default_token_party")]
    pub audience: String,

    /// Registering with this address yields an admin account
    #[serde(default)]
    pub admin_email: Option<String>,

    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

fn default_jwt_secret() -> String {
    "dev-jwt-secret".to_string()
}

fn default_token_ttl() -> i64 {
    15
}

fn default_token_party() -> String {
    "papergate".to_string()
}

fn default_min_password_length() -> usize {
    8
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            access_token_ttl_minutes: default_token_ttl(),
            issuer: default_token_party(),
            audience: default_token_party(),
            admin_email: None,
            min_password_length: default_min_password_length(),
        }
    }
}

/// S3-compatible bucket credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint (MinIO and friends), addressed path-style
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub secret_access_key: String,

    #[serde(default)]
    pub session_token: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    #[serde(default = "default_url_expiry")]
    pub download_url_expiry_secs: u64,

    /// Remote storage; uploads stay local when absent
    #[serde(default)]
    pub s3: Option<S3Config>,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_url_expiry() -> u64 {
    DEFAULT_URL_EXPIRY_SECS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            download_url_expiry_secs: default_url_expiry(),
            s3: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,

    #[serde(default)]
    pub price_id: String,

    #[serde(default)]
    pub webhook_secret: Option<String>,

    #[serde(default)]
    pub connect_account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Checkout marks the caller paid without a payment provider
    #[serde(default = "default_simulate_payments")]
    pub simulate_payments: bool,

    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    #[serde(default)]
    pub stripe: Option<StripeConfig>,
}

fn default_simulate_payments() -> bool {
    true
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            simulate_payments: default_simulate_payments(),
            frontend_url: default_frontend_url(),
            stripe: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_user: String,

    #[serde(default)]
    pub smtp_password: String,

    #[serde(default)]
    pub from_email: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,

    /// Admin inbox for upload and feedback notifications
    #[serde(default)]
    pub notify_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// One JSON object per line instead of the human format
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub billing: BillingConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("papergate.db")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database_path: default_database_path(),
            quota: QuotaConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            billing: BillingConfig::default(),
            email: EmailConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read the JSON file (if any), apply process environment overrides and validate.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply overrides from `lookup`. Blank values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = get("DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = get("FREE_DOC_LIMIT") {
            self.quota.free_doc_limit = parse_env("FREE_DOC_LIMIT", &v)?;
        }
        if let Some(v) = get("DOWNLOAD_URL_EXPIRY") {
            self.storage.download_url_expiry_secs = parse_env("DOWNLOAD_URL_EXPIRY", &v)?;
        }
        if let Some(v) = get("SIMULATE_PAYMENTS") {
            self.billing.simulate_payments = parse_flag("SIMULATE_PAYMENTS", &v)?;
        }
        if let Some(v) = get("JWT_SECRET_KEY") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = get("ADMIN_EMAIL") {
            self.auth.admin_email = Some(v);
        }
        if let Some(v) = get("FRONTEND_URL") {
            self.billing.frontend_url = v;
        }

        if let Some(secret_key) = get("STRIPE_SECRET_KEY") {
            let stripe = self.billing.stripe.get_or_insert_with(|| StripeConfig {
                secret_key: String::new(),
                price_id: String::new(),
                webhook_secret: None,
                connect_account_id: None,
            });
            stripe.secret_key = secret_key;
        }
        if let Some(stripe) = self.billing.stripe.as_mut() {
            if let Some(v) = get("STRIPE_PRICE_ID") {
                stripe.price_id = v;
            }
            if let Some(v) = get("STRIPE_WEBHOOK_SECRET") {
                stripe.webhook_secret = Some(v);
            }
            if let Some(v) = get("STRIPE_CONNECT_ACCOUNT_ID") {
                stripe.connect_account_id = Some(v);
            }
        }

        if let Some(bucket) = get("S3_BUCKET") {
            let s3 = self.storage.s3.get_or_insert_with(|| S3Config {
                bucket: String::new(),
                region: default_region(),
                endpoint: None,
                access_key_id: String::new(),
                secret_access_key: String::new(),
                session_token: None,
            });
            s3.bucket = bucket;
        }
        if let Some(s3) = self.storage.s3.as_mut() {
            if let Some(v) = get("AWS_REGION") {
                s3.region = v;
            }
            if let Some(v) = get("AWS_ACCESS_KEY_ID") {
                s3.access_key_id = v;
            }
            if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
                s3.secret_access_key = v;
            }
        }

        if let Some(host) = get("SMTP_HOST") {
            let smtp = self.email.smtp.get_or_insert_with(|| SmtpConfig {
                smtp_host: String::new(),
                smtp_port: default_smtp_port(),
                smtp_user: String::new(),
                smtp_password: String::new(),
                from_email: String::new(),
            });
            smtp.smtp_host = host;
        }
        if let Some(smtp) = self.email.smtp.as_mut() {
            if let Some(v) = get("SMTP_PORT") {
                smtp.smtp_port = parse_env("SMTP_PORT", &v)?;
            }
            if let Some(v) = get("SMTP_USER") {
                smtp.smtp_user = v;
            }
            if let Some(v) = get("SMTP_PASS") {
                smtp.smtp_password = v;
            }
            if let Some(v) = get("EMAIL_FROM") {
                smtp.from_email = v;
            }
        }
        if self.email.notify_email.is_none() {
            self.email.notify_email = self.auth.admin_email.clone();
        }

        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be > 0".into()));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        if self.auth.access_token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "auth.access_token_ttl_minutes must be > 0".into(),
            ));
        }
        if let Some(s3) = &self.storage.s3 {
            if s3.bucket.trim().is_empty()
                || s3.access_key_id.trim().is_empty()
                || s3.secret_access_key.trim().is_empty()
            {
                return Err(ConfigError::Invalid(
                    "storage.s3 needs bucket, access_key_id and secret_access_key".into(),
                ));
            }
        }
        if let Some(stripe) = &self.billing.stripe {
            if stripe.secret_key.trim().is_empty() || stripe.price_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "billing.stripe needs secret_key and price_id".into(),
                ));
            }
        }
        if let Some(smtp) = &self.email.smtp {
            if smtp.smtp_host.trim().is_empty() || smtp.from_email.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "email.smtp needs smtp_host and from_email".into(),
                ));
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.socket_addr(), "0.0.0.0:5000");
        assert_eq!(config.quota.free_doc_limit, 2);
        assert_eq!(config.storage.download_url_expiry_secs, 300);
        assert!(config.billing.simulate_payments);
        assert!(config.storage.s3.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("papergate.json");
        fs::write(
            &path,
            json!({ "server": { "port": 8080 }, "quota": { "free_doc_limit": 5 } }).to_string(),
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.quota.free_doc_limit, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_and_bad_json() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            AppConfig::from_file(&temp.path().join("nope.json")),
            Err(ConfigError::Read { .. })
        ));

        let path = temp.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::from_file(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("FREE_DOC_LIMIT", "3"),
                ("DOWNLOAD_URL_EXPIRY", "60"),
                ("SIMULATE_PAYMENTS", "false"),
                ("ADMIN_EMAIL", "admin@example.com"),
                ("STRIPE_SECRET_KEY", "sk_test"),
                ("STRIPE_PRICE_ID", "price_1"),
                ("STRIPE_WEBHOOK_SECRET", "whsec_1"),
                ("S3_BUCKET", "papers"),
                ("AWS_REGION", "eu-west-1"),
                ("AWS_ACCESS_KEY_ID", "AKID"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
                ("PORT", "9000"),
            ]))
            .unwrap();

        assert_eq!(config.quota.free_doc_limit, 3);
        assert_eq!(config.storage.download_url_expiry_secs, 60);
        assert!(!config.billing.simulate_payments);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.email.notify_email.as_deref(), Some("admin@example.com"));

        let stripe = config.billing.stripe.as_ref().unwrap();
        assert_eq!(stripe.webhook_secret.as_deref(), Some("whsec_1"));
        let s3 = config.storage.s3.as_ref().unwrap();
        assert_eq!(s3.region, "eu-west-1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_env_is_ignored_and_garbage_rejected() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("FREE_DOC_LIMIT", "  ")])).unwrap();
        assert_eq!(config.quota.free_doc_limit, 2);

        assert!(matches!(
            config.apply_env(env(&[("FREE_DOC_LIMIT", "two")])),
            Err(ConfigError::InvalidEnv { .. })
        ));
        assert!(config.apply_env(env(&[("SIMULATE_PAYMENTS", "maybe")])).is_err());
    }

    #[test]
    fn test_validate_rejects_incomplete_sections() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("S3_BUCKET", "papers")])).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.auth.jwt_secret = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }
}
