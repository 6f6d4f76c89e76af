//! # Documents
//!
//! Uploaded course documents, their moderation lifecycle and the queries
//! behind listing, upload, moderation and deletion.

pub mod model;
pub mod lifecycle;
pub mod repository;
pub mod upload;
pub mod service;

pub use model::{
    Document, DocumentKind, DocumentListing, DocumentStatus, NewDocument, StorageDescriptor,
    StorageKind,
};
pub use lifecycle::{is_readable_by, transition, Moderation};
pub use repository::MAX_LISTING;
pub use upload::{UploadForm, ValidatedUpload};
pub use service::DocumentService;
