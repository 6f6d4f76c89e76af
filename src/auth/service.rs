//! # Auth Service
//!
//! Registration, login and bearer-token authentication.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::crypto::PasswordPolicy;
use super::errors::{AuthError, AuthResult};
use super::jwt::{JwtConfig, JwtManager};
use super::user::{LoginRequest, NewUser, RegisterRequest, Role, User, UserRepository};

/// Token returned after register/login
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Auth service combining the user repository and JWT issuance
pub struct AuthService<U: UserRepository> {
    user_repo: Arc<U>,
    jwt_manager: JwtManager,
    password_policy: PasswordPolicy,
    admin_email: Option<String>,
}

impl<U: UserRepository> AuthService<U> {
    pub fn new(
        user_repo: Arc<U>,
        jwt_config: JwtConfig,
        password_policy: PasswordPolicy,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            user_repo,
            jwt_manager: JwtManager::new(jwt_config),
            password_policy,
            admin_email: admin_email.filter(|e| !e.trim().is_empty()),
        }
    }

    /// Role granted at registration: admin only for the configured admin address
    fn role_for(&self, email: &str) -> Role {
        match &self.admin_email {
            Some(admin) if admin.eq_ignore_ascii_case(email.trim()) => Role::Admin,
            _ => Role::User,
        }
    }

    fn issue(&self, user: &User) -> AuthResult<TokenResponse> {
        Ok(TokenResponse {
            access_token: self.jwt_manager.generate_access_token(user)?,
            token_type: "bearer".to_string(),
            expires_in: self.jwt_manager.ttl_seconds(),
        })
    }

    /// Register a new user
    pub fn register(&self, request: RegisterRequest) -> AuthResult<(User, TokenResponse)> {
        let role = self.role_for(&request.email);
        let new_user = NewUser::new(&request.email, &request.password, role, &self.password_policy)?;

        if self.user_repo.find_by_email(&new_user.email)?.is_some() {
            return Err(AuthError::EmailAlreadyExists);
        }

        let user = self.user_repo.create(&new_user)?;
        info!(user_id = user.id, role = %user.role, "user registered");

        let tokens = self.issue(&user)?;
        Ok((user, tokens))
    }

    /// Authenticate a user by email and password
    pub fn login(&self, request: LoginRequest) -> AuthResult<(User, TokenResponse)> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let user = self
            .user_repo
            .find_by_email(request.email.trim())?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.verify_password(&request.password)? {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue(&user)?;
        Ok((user, tokens))
    }

    /// Resolve a bearer token to the current state of its user
    pub fn authenticate(&self, token: &str) -> AuthResult<User> {
        let claims = self.jwt_manager.validate_token(token)?;
        let user_id = JwtManager::get_user_id(&claims)?;
        self.user_repo
            .find_by_id(user_id)?
            .ok_or(AuthError::UnknownUser)
    }

    pub fn user_repo(&self) -> &Arc<U> {
        &self.user_repo
    }
}

/// Admin gate used by every moderation endpoint
pub fn require_admin(user: &User) -> AuthResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AuthError::AdminRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::SqliteUserRepository;
    use crate::store::Database;
    use tempfile::TempDir;

    fn service(admin: Option<&str>) -> (TempDir, AuthService<SqliteUserRepository>) {
        let temp = TempDir::new().unwrap();
        let db = Database::open(temp.path().join("auth.db")).unwrap();
        let service = AuthService::new(
            Arc::new(SqliteUserRepository::new(db)),
            JwtConfig::default(),
            PasswordPolicy::default(),
            admin.map(str::to_string),
        );
        (temp, service)
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "password123".to_string(),
        }
    }

    #[test]
    fn test_register_and_login() {
        let (_temp, service) = service(None);

        let (user, tokens) = service.register(register_request("a@example.com")).unwrap();
        assert_eq!(user.role, Role::User);
        assert!(!tokens.access_token.is_empty());

        let (logged_in, _) = service
            .login(LoginRequest {
                email: "a@example.com".to_string(),
                password: "password123".to_string(),
            })
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let authed = service.authenticate(&tokens.access_token).unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[test]
    fn test_admin_email_promotes() {
        let (_temp, service) = service(Some("boss@example.com"));

        let (admin, _) = service.register(register_request("boss@example.com")).unwrap();
        assert!(admin.is_admin());
        assert!(require_admin(&admin).is_ok());

        let (user, _) = service.register(register_request("pleb@example.com")).unwrap();
        assert!(matches!(require_admin(&user), Err(AuthError::AdminRequired)));
    }

    #[test]
    fn test_duplicate_registration() {
        let (_temp, service) = service(None);
        service.register(register_request("a@example.com")).unwrap();

        let result = service.register(register_request("a@example.com"));
        assert!(matches!(result, Err(AuthError::EmailAlreadyExists)));
    }

    #[test]
    fn test_wrong_password() {
        let (_temp, service) = service(None);
        service.register(register_request("a@example.com")).unwrap();

        let result = service.login(LoginRequest {
            email: "a@example.com".to_string(),
            password: "nope-nope".to_string(),
        });
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }
}
