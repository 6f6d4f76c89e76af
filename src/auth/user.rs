//! # User Management
//!
//! User model and repository. `subscription_status` is written only through
//! [`UserRepository::set_subscription_status`], which the payment reconciler owns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::crypto::{hash_password, verify_password, PasswordPolicy};
use super::errors::{AuthError, AuthResult};
use crate::store::{Database, StoreError, StoreResult};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paid-plan state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Free,
    Paid,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Free => "free",
            SubscriptionStatus::Paid => "paid",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionStatus::Free),
            "paid" => Ok(SubscriptionStatus::Paid),
            other => Err(format!("unknown subscription status '{}'", other)),
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User model
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,

    /// Unique email address
    pub email: String,

    /// Argon2id password hash (never plaintext)
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: Role,

    pub subscription_status: SubscriptionStatus,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether this user bypasses moderation and quota checks
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_paid(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Paid
    }

    /// Verify a password against this user's stored hash
    pub fn verify_password(&self, password: &str) -> AuthResult<bool> {
        verify_password(password, &self.password_hash)
    }
}

/// An account that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl NewUser {
    /// Validate and hash credentials for a new account
    pub fn new(email: &str, password: &str, role: Role, policy: &PasswordPolicy) -> AuthResult<Self> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        policy.validate(password)?;

        Ok(Self {
            email: email.to_string(),
            password_hash: hash_password(password)?,
            role,
        })
    }
}

/// User creation request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// User login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// User repository trait
///
/// Abstracts storage operations for users.
pub trait UserRepository: Send + Sync {
    /// Find a user by their ID
    fn find_by_id(&self, id: i64) -> AuthResult<Option<User>>;

    /// Find a user by their email
    fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Create a new user
    fn create(&self, user: &NewUser) -> AuthResult<User>;

    /// Overwrite the subscription state. Returns `false` if the user does not exist.
    fn set_subscription_status(&self, id: i64, status: SubscriptionStatus) -> AuthResult<bool>;
}

const USER_COLUMNS: &str = "id, email, password_hash, role, subscription_status, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    let status: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: role.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?,
        subscription_status: status.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
        })?,
        created_at: row.get(5)?,
    })
}

/// Load a user on an existing connection or transaction
pub fn load_user(conn: &Connection, id: i64) -> StoreResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, params![id], user_from_row).optional()?)
}

/// SQLite-backed user repository
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    db: Database,
}

impl SqliteUserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl UserRepository for SqliteUserRepository {
    fn find_by_id(&self, id: i64) -> AuthResult<Option<User>> {
        Ok(self.db.with_conn(|conn| load_user(conn, id))?)
    }

    fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        Ok(self.db.with_conn(|conn| {
            Ok(conn.query_row(&sql, params![email], user_from_row).optional()?)
        })?)
    }

    fn create(&self, user: &NewUser) -> AuthResult<User> {
        let created_at = Utc::now();
        let result = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, password_hash, role, subscription_status, created_at)
                 VALUES (?1, ?2, ?3, 'free', ?4)",
                params![user.email, user.password_hash, user.role.as_str(), created_at],
            )?;
            Ok(conn.last_insert_rowid())
        });

        match result {
            Ok(id) => Ok(User {
                id,
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                role: user.role,
                subscription_status: SubscriptionStatus::Free,
                created_at,
            }),
            Err(StoreError::Constraint(_)) => Err(AuthError::EmailAlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn set_subscription_status(&self, id: i64, status: SubscriptionStatus) -> AuthResult<bool> {
        let changed = self.db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE users SET subscription_status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?)
        })?;
        Ok(changed == 1)
    }
}
