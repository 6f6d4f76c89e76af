//! Upload validation and stored-name generation.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use super::model::DocumentKind;
use crate::errors::{ServiceError, ServiceResult};

pub const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

/// Raw upload form as received from the client
#[derive(Debug, Default, Clone)]
pub struct UploadForm {
    pub title: Option<String>,
    pub course_code: Option<String>,
    pub year: Option<String>,
    pub term: Option<String>,
    pub kind: Option<String>,
    pub notes: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Upload that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub title: String,
    pub course_code: String,
    pub year: Option<String>,
    pub term: Option<String>,
    pub kind: DocumentKind,
    pub notes: Option<String>,
    /// `<uuid>_<sanitised original name>`
    pub stored_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_pdf(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Strip path components and anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars =
        UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"));

    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = unsafe_chars.replace_all(base.trim(), "_");
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    if cleaned.is_empty() {
        "document.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}

impl UploadForm {
    pub fn validate(self) -> ServiceResult<ValidatedUpload> {
        let file_name = non_empty(self.file_name)
            .ok_or_else(|| ServiceError::validation("PDF file required"))?;
        if self.bytes.is_empty() {
            return Err(ServiceError::validation("PDF file required"));
        }
        if !is_pdf(&file_name) {
            return Err(ServiceError::validation("Only PDF uploads are allowed"));
        }

        let (title, course_code) = match (non_empty(self.title), non_empty(self.course_code)) {
            (Some(t), Some(c)) => (t, c),
            _ => return Err(ServiceError::validation("Title and course code required")),
        };

        let kind = match non_empty(self.kind) {
            None => DocumentKind::Paper,
            Some(k) => k
                .parse()
                .map_err(|_| ServiceError::validation("Invalid document type"))?,
        };

        Ok(ValidatedUpload {
            title,
            course_code,
            year: non_empty(self.year),
            term: non_empty(self.term),
            kind,
            notes: non_empty(self.notes),
            stored_name: format!("{}_{}", Uuid::new_v4().simple(), sanitize_file_name(&file_name)),
            content_type: non_empty(self.content_type)
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            bytes: self.bytes,
        })
    }
}
