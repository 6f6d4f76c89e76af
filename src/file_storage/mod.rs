//! # File Storage
//!
//! Upload backends (local directory, S3-compatible bucket) and the resolver
//! that turns a stored descriptor into a downloadable location.

pub mod errors;
pub mod backend;
pub mod local;
pub mod signer;
pub mod s3;
pub mod resolver;

pub use errors::{StorageError, StorageResult};
pub use backend::{BlobStore, RemoteStore};
pub use local::LocalStore;
pub use signer::{S3Credentials, S3Signer};
pub use s3::S3Store;
pub use resolver::{attachment_disposition, Location, StorageResolver, DEFAULT_URL_EXPIRY_SECS};
