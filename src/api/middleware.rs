//! API middleware
//!
//! Contains:
//! - `AppState`, the shared state handed to every handler
//! - `ApiError`, the JSON error body used by all endpoints
//! - Session authentication with sliding expiry

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::SessionClaims;
use crate::services::{HabitService, SessionError, SessionManager, UserService, SESSION_COOKIE};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub habit_service: Arc<HabitService>,
    pub sessions: Arc<SessionManager>,
}

/// Claims of the verified session, inserted by `require_auth`
#[derive(Debug, Clone)]
pub struct AuthenticatedSession(pub SessionClaims);

impl<S> FromRequestParts<S> for AuthenticatedSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedSession>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("no session"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the cause and return a generic 500; details never reach the client
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Extract the session token, preferring `Authorization: Bearer` over the
/// `session` cookie
pub(crate) fn extract_session_token(request: &Request) -> Option<String> {
    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    let prefix = format!("{}=", SESSION_COOKIE);
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().strip_prefix(prefix.as_str()))
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Authentication middleware
///
/// Rejects requests without a valid session with 401. A valid session is
/// refreshed up front, so handlers see the refreshed claims through
/// `AuthenticatedSession` and the response carries the matching cookie
/// unless the handler set one itself.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(&request).ok_or_else(|| ApiError::unauthorized("no session"))?;

    let refreshed = state.sessions.refresh(&token).map_err(|e| match e {
        SessionError::InvalidToken => ApiError::unauthorized("no session"),
        other => ApiError::internal_error(other),
    })?;

    request
        .extensions_mut()
        .insert(AuthenticatedSession(refreshed.claims.clone()));
    let mut response = next.run(request).await;

    if !response.headers().contains_key(header::SET_COOKIE) {
        let cookie = HeaderValue::from_str(&state.sessions.session_cookie(&refreshed))
            .map_err(ApiError::internal_error)?;
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }

    Ok(response)
}
