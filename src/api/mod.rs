//! API layer - HTTP handlers and routing
//!
//! JSON endpoints under `/api/v1`:
//! - Auth endpoints (register, login, logout, session)
//! - Habit endpoints (list, create, check in), all behind `require_auth`

pub mod auth;
pub mod habits;
pub mod middleware;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedSession};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/habits", habits::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // Cookie authentication needs credentials, so the origin must be exact
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    let cors = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin {:?}: {}", cors_origin, e);
            cors
        }
    };

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCheckInRepository, SqlxHabitRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::services::{DayPolicy, HabitService, SessionManager, UserService};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use chrono::Duration;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_app() -> (Router, AppState) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let sessions = Arc::new(SessionManager::new("router-secret", Duration::days(7)).unwrap());
        let user_service = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            sessions.clone(),
        ));
        let habit_service = Arc::new(HabitService::new(
            SqlxHabitRepository::boxed(pool.clone()),
            SqlxCheckInRepository::boxed(pool.clone()),
            DayPolicy::new(-420),
        ));
        let state = AppState {
            user_service,
            habit_service,
            sessions,
        };

        (build_router(state.clone(), "http://localhost:3000"), state)
    }

    fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// `name=value` part of the response's Set-Cookie header
    fn session_cookie(response: &Response) -> String {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("missing Set-Cookie")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn register_and_login(app: &Router, username: &str) -> String {
        let creds = json!({ "username": username, "password": "password123" });
        let response = app
            .clone()
            .oneshot(post_json("/api/v1/auth/register", creds.clone(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/auth/login", creds, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response)
    }

    #[tokio::test]
    async fn test_register_does_not_set_cookie() {
        let (app, _state) = test_app().await;

        let response = app
            .oneshot(post_json(
                "/api/v1/auth/register",
                json!({ "username": "alice", "password": "pw" }),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = body_json(response).await;
        assert_eq!(body["user"]["username"], "alice");
        assert!(body["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_register_errors() {
        let (app, _state) = test_app().await;

        let missing = app
            .clone()
            .oneshot(post_json("/api/v1/auth/register", json!({ "username": "alice" }), None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(missing).await["error"]["code"], "VALIDATION_ERROR");

        let creds = json!({ "username": "alice", "password": "pw" });
        app.clone()
            .oneshot(post_json("/api/v1/auth/register", creds.clone(), None))
            .await
            .unwrap();
        let duplicate = app
            .oneshot(post_json("/api/v1/auth/register", creds, None))
            .await
            .unwrap();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_login_sets_session_cookie() {
        let (app, state) = test_app().await;
        let cookie = register_and_login(&app, "alice").await;

        let token = cookie.strip_prefix("session=").expect("cookie name");
        let claims = state.sessions.verify(token).expect("token should verify");
        assert_eq!(claims.user, "alice");
    }

    #[tokio::test]
    async fn test_credentials_body_errors_are_validation_errors() {
        let (app, _state) = test_app().await;

        let requests = [
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .body(Body::empty())
                .unwrap(),
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("username=alice"))
                .unwrap(),
        ];

        for request in requests {
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_login_bad_credentials() {
        let (app, _state) = test_app().await;
        register_and_login(&app, "alice").await;

        let response = app
            .oneshot(post_json(
                "/api/v1/auth/login",
                json!({ "username": "alice", "password": "wrong" }),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_logout_expires_cookie() {
        let (app, _state) = test_app().await;

        let response = app
            .oneshot(post_json("/api/v1/auth/logout", json!({}), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        let (app, state) = test_app().await;
        let expired = state
            .sessions
            .issue_at(1, "alice", chrono::Utc::now() - Duration::days(8))
            .unwrap();

        for cookie in [None, Some("session=garbage".to_string()), Some(format!("session={}", expired.token))] {
            let response = app
                .clone()
                .oneshot(get("/api/v1/habits", cookie.as_deref()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(body_json(response).await["error"]["message"], "no session");
        }
    }

    #[tokio::test]
    async fn test_protected_route_refreshes_cookie() {
        let (app, state) = test_app().await;
        let cookie = register_and_login(&app, "alice").await;
        let login_exp = state
            .sessions
            .verify(cookie.strip_prefix("session=").unwrap())
            .unwrap()
            .exp;

        let response = app
            .oneshot(get("/api/v1/auth/session", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let refreshed = session_cookie(&response);
        let claims = state
            .sessions
            .verify(refreshed.strip_prefix("session=").unwrap())
            .expect("refreshed token should verify");
        assert!(claims.exp > login_exp);

        let body = body_json(response).await;
        assert_eq!(body["username"], "alice");
        let reported: chrono::DateTime<chrono::Utc> =
            serde_json::from_value(body["expires_at"].clone()).unwrap();
        assert_eq!(reported.timestamp(), claims.exp);
    }

    #[tokio::test]
    async fn test_habit_flow() {
        let (app, _state) = test_app().await;
        let cookie = register_and_login(&app, "alice").await;

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/habits", json!({ "name": "Read" }), Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let habit = body_json(response).await;
        assert_eq!(habit["name"], "Read");
        assert_eq!(habit["streak"], 0);
        let id = habit["id"].as_i64().unwrap();

        let response = app
            .clone()
            .oneshot(post_json(&format!("/api/v1/habits/{}/checkins", id), json!({}), Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["habit"]["streak"], 1);
        assert_eq!(body["checkin"]["habit_id"], id);

        let response = app
            .oneshot(get("/api/v1/habits", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["username"], "alice");
        assert!(body["day_ends_in"].is_string());
        assert_eq!(body["habits"][0]["streak"], 1);
    }

    #[tokio::test]
    async fn test_check_in_on_other_users_habit_is_not_found() {
        let (app, _state) = test_app().await;
        let alice = register_and_login(&app, "alice").await;
        let bob = register_and_login(&app, "bob").await;

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/habits", json!({ "name": "Swim" }), Some(&bob)))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_i64().unwrap();

        let response = app
            .oneshot(post_json(&format!("/api/v1/habits/{}/checkins", id), json!({}), Some(&alice)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
