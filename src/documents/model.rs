//! Document model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "approved" => Ok(DocumentStatus::Approved),
            "rejected" => Ok(DocumentStatus::Rejected),
            other => Err(format!("unknown document status '{}'", other)),
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Paper,
    Solution,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Paper => "paper",
            DocumentKind::Solution => "solution",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paper" => Ok(DocumentKind::Paper),
            "solution" => Ok(DocumentKind::Solution),
            other => Err(format!("unknown document kind '{}'", other)),
        }
    }
}

/// Which backend holds the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Remote,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::Remote => "remote",
        }
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(StorageKind::Local),
            "remote" => Ok(StorageKind::Remote),
            other => Err(format!("unknown storage kind '{}'", other)),
        }
    }
}

/// Persisted storage location of a document's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    pub kind: StorageKind,
    /// Path relative to the upload directory, or object key
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub course_code: String,
    pub year: Option<String>,
    pub term: Option<String>,
    pub kind: DocumentKind,
    pub notes: Option<String>,
    /// Stored file name, used for the download's Content-Disposition
    pub file_name: String,
    pub storage: StorageDescriptor,
    pub content_type: String,
    pub status: DocumentStatus,
    pub uploader_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A validated document ready to be inserted
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub course_code: String,
    pub year: Option<String>,
    pub term: Option<String>,
    pub kind: DocumentKind,
    pub notes: Option<String>,
    pub file_name: String,
    pub storage: StorageDescriptor,
    pub content_type: String,
    pub uploader_id: i64,
}

/// Listing row: a document plus its uploader's email
#[derive(Debug, Clone)]
pub struct DocumentListing {
    pub document: Document,
    pub uploader_email: String,
}
