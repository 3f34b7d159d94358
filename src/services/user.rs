//! User service
//!
//! Implements business logic for user management:
//! - Registration (unique name, Argon2id password hash)
//! - Login (credential check, then a signed session token)
//!
//! Registration does not log the user in; clients call `login` afterwards.

use crate::db::repositories::UserRepository;
use crate::models::User;
use crate::services::password::{hash_password, verify_password};
use crate::services::session::{IssuedToken, SessionError, SessionManager};
use anyhow::Context;
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// User already exists
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Session token could not be issued
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A successful login: the user and their new session token
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: IssuedToken,
}

/// User service for registration and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    sessions: Arc<SessionManager>,
}

impl UserService {
    /// Create a new user service
    pub fn new(user_repo: Arc<dyn UserRepository>, sessions: Arc<SessionManager>) -> Self {
        Self {
            user_repo,
            sessions,
        }
    }

    /// Register a new user
    ///
    /// # Errors
    ///
    /// - `ValidationError` if the username (after trimming) or password is empty
    /// - `UserExists` if the name is taken, including when a concurrent
    ///   registration wins the race to the UNIQUE constraint
    /// - `InternalError` for database errors
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        if username.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }
        if input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Password cannot be empty".to_string(),
            ));
        }

        if self
            .user_repo
            .get_by_name(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(taken(&username));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        match self.user_repo.create(&User::new(username.clone(), password_hash)).await {
            Ok(user) => {
                tracing::info!("Registered user {} (id {})", user.name, user.id);
                Ok(user)
            }
            Err(e) if is_unique_violation(&e) => Err(taken(&username)),
            Err(e) => Err(e.context("Failed to create user").into()),
        }
    }

    /// Check credentials and issue a session token
    ///
    /// Unknown users and wrong passwords fail with the same
    /// `AuthenticationError`.
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, UserServiceError> {
        let username = input.username.trim();
        if username.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username and password are required".to_string(),
            ));
        }

        let user = self
            .user_repo
            .get_by_name(username)
            .await
            .context("Failed to get user by name")?
            .ok_or_else(|| {
                tracing::debug!("Login failed: unknown user {}", username);
                UserServiceError::AuthenticationError(INVALID_CREDENTIALS.to_string())
            })?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!("Login failed: wrong password for user {}", user.id);
            return Err(UserServiceError::AuthenticationError(
                INVALID_CREDENTIALS.to_string(),
            ));
        }

        let session = self.sessions.issue(user.id, &user.name)?;
        tracing::info!("User {} logged in", user.id);

        Ok(LoginOutcome { user, session })
    }
}

fn taken(username: &str) -> UserServiceError {
    UserServiceError::UserExists(format!("Username '{}' is already taken", username))
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    }
}
