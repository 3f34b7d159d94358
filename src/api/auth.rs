//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Create an account (does not log in)
//! - POST /api/v1/auth/login - Check credentials, set the session cookie
//! - POST /api/v1/auth/logout - Clear the session cookie
//! - GET /api/v1/auth/session - Current session claims

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedSession};
use crate::models::User;
use crate::services::user::{LoginInput, RegisterInput, UserServiceError};

/// Request body for registration and login.
///
/// Fields are optional so that a missing field is reported as a
/// validation error rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl CredentialsRequest {
    /// Parse a raw body; an empty body counts as no credentials
    fn from_body(body: &Bytes) -> Result<Self, ApiError> {
        if body.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::validation_error(format!("Invalid request body: {}", e)))
    }

    fn into_parts(self) -> Result<(String, String), ApiError> {
        match (self.username, self.password) {
            (Some(username), Some(password)) if !username.trim().is_empty() && !password.is_empty() => {
                Ok((username, password))
            }
            _ => Err(ApiError::validation_error("Username and password are required")),
        }
    }
}

/// Response for user info
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.name,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
}

/// Response for a successful login or session lookup
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: i64,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Build the public auth routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Build the auth routes that require a session
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/session", get(current_session))
}

fn map_user_error(e: UserServiceError) -> ApiError {
    match e {
        UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        UserServiceError::UserExists(msg) => ApiError::conflict(msg),
        UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
        other => ApiError::internal_error(other),
    }
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let (username, password) = CredentialsRequest::from_body(&body)?.into_parts()?;

    let user = state
        .user_service
        .register(RegisterInput::new(username, password))
        .await
        .map_err(map_user_error)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user: user.into() }),
    ))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let (username, password) = CredentialsRequest::from_body(&body)?.into_parts()?;

    let outcome = state
        .user_service
        .login(LoginInput::new(username, password))
        .await
        .map_err(map_user_error)?;

    let cookie = state.sessions.session_cookie(&outcome.session);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal_error)?,
    );

    Ok((
        headers,
        Json(SessionResponse {
            user_id: outcome.user.id,
            username: outcome.user.name,
            expires_at: outcome.session.claims.expires_at(),
        }),
    ))
}

/// POST /api/v1/auth/logout
///
/// Sessions live only in the cookie, so logging out works with or without
/// a valid session.
async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&state.sessions.revocation_cookie())
            .map_err(ApiError::internal_error)?,
    );

    Ok((StatusCode::NO_CONTENT, headers))
}

/// GET /api/v1/auth/session
///
/// `require_auth` has already refreshed the session, so `expires_at` matches
/// the cookie sent with this response.
async fn current_session(AuthenticatedSession(claims): AuthenticatedSession) -> Json<SessionResponse> {
    Json(SessionResponse {
        user_id: claims.uid,
        expires_at: claims.expires_at(),
        username: claims.user,
    })
}
