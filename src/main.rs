//! Streaks - a small habit tracker

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use streaks::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{SqlxCheckInRepository, SqlxHabitRepository, SqlxUserRepository},
    },
    services::{DayPolicy, HabitService, SessionManager, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streaks=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Streaks...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Refuse to start without a signing secret
    let sessions = Arc::new(
        SessionManager::from_config(&config.auth).context("Cannot sign session tokens")?,
    );

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await.context("Database is not reachable")?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Build services
    let user_service = Arc::new(UserService::new(
        SqlxUserRepository::boxed(pool.clone()),
        sessions.clone(),
    ));
    let habit_service = Arc::new(HabitService::new(
        SqlxHabitRepository::boxed(pool.clone()),
        SqlxCheckInRepository::boxed(pool.clone()),
        DayPolicy::new(config.streak.utc_offset_minutes),
    ));

    let state = AppState {
        user_service,
        habit_service,
        sessions,
    };

    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
