//! # Auth Module
//!
//! Accounts, password hashing and bearer tokens. Role and subscription state
//! live on [`User`]; the admin bypass is [`User::is_admin`] and nothing else.

pub mod errors;
pub mod crypto;
pub mod user;
pub mod jwt;
pub mod service;

pub use errors::{AuthError, AuthResult};
pub use user::{Role, SqliteUserRepository, SubscriptionStatus, User, UserRepository};
pub use jwt::{JwtConfig, JwtManager};
pub use service::{require_admin, AuthService, TokenResponse};
