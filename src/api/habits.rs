//! Habit API endpoints
//!
//! All routes require a session.
//! - GET /api/v1/habits - List habits after resetting broken streaks
//! - POST /api/v1/habits - Create a habit
//! - POST /api/v1/habits/{id}/checkins - Check in on a habit

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedSession};
use crate::models::{CheckIn, CreateHabitInput, HabitTemplate};
use crate::services::{format_remaining, HabitServiceError};

#[derive(Debug, Serialize)]
pub struct HabitListResponse {
    pub username: String,
    /// Time left in the current day window, e.g. "3 hours"
    pub day_ends_in: String,
    pub habits: Vec<HabitTemplate>,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub checkin: CheckIn,
    pub habit: HabitTemplate,
}

/// Build the habit router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_habits).post(create_habit))
        .route("/{id}/checkins", post(check_in))
}

fn map_habit_error(e: HabitServiceError) -> ApiError {
    match e {
        HabitServiceError::NotFound(id) => ApiError::not_found(format!("Habit {} not found", id)),
        other => ApiError::internal_error(other),
    }
}

/// GET /api/v1/habits
async fn list_habits(
    State(state): State<AppState>,
    AuthenticatedSession(claims): AuthenticatedSession,
) -> Result<Json<HabitListResponse>, ApiError> {
    let now = Utc::now();
    let habits = state
        .habit_service
        .list_for_user(claims.uid, now)
        .await
        .map_err(map_habit_error)?;

    Ok(Json(HabitListResponse {
        username: claims.user,
        day_ends_in: format_remaining(state.habit_service.policy().remaining_today(now)),
        habits,
    }))
}

/// POST /api/v1/habits
async fn create_habit(
    State(state): State<AppState>,
    AuthenticatedSession(claims): AuthenticatedSession,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // An empty body creates an unnamed habit
    let input: CreateHabitInput = if body.is_empty() {
        CreateHabitInput::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation_error(format!("Invalid request body: {}", e)))?
    };

    let habit = state
        .habit_service
        .create(claims.uid, &input)
        .await
        .map_err(map_habit_error)?;

    Ok((StatusCode::CREATED, Json(habit)))
}

/// POST /api/v1/habits/{id}/checkins
async fn check_in(
    State(state): State<AppState>,
    AuthenticatedSession(claims): AuthenticatedSession,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .habit_service
        .check_in(claims.uid, id, Utc::now())
        .await
        .map_err(map_habit_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CheckInResponse {
            checkin: outcome.checkin,
            habit: outcome.habit,
        }),
    ))
}
