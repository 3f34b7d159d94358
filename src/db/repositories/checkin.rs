//! Check-in repository
//!
//! Check-ins are append-only. Recording one also increments the habit's
//! streak; both writes share a single transaction.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::CheckIn;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Check-in repository trait
#[async_trait]
pub trait CheckInRepository: Send + Sync {
    /// Insert a check-in and increment the habit's streak atomically.
    ///
    /// On any failure neither write is visible.
    async fn record(&self, habit_id: i64, at: DateTime<Utc>) -> Result<CheckIn>;

    /// Most recent check-in for a habit
    async fn latest_for_habit(&self, habit_id: i64) -> Result<Option<CheckIn>>;

    /// Number of check-ins recorded for a habit
    async fn count_for_habit(&self, habit_id: i64) -> Result<i64>;
}

/// SQLx-based check-in repository implementation
pub struct SqlxCheckInRepository {
    pool: DynDatabasePool,
}

impl SqlxCheckInRepository {
    /// Create a new SQLx check-in repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CheckInRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CheckInRepository for SqlxCheckInRepository {
    async fn record(&self, habit_id: i64, at: DateTime<Utc>) -> Result<CheckIn> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => record_checkin_sqlite(self.pool.sqlite()?, habit_id, at).await,
            DatabaseDriver::Mysql => record_checkin_mysql(self.pool.mysql()?, habit_id, at).await,
        }
    }

    async fn latest_for_habit(&self, habit_id: i64) -> Result<Option<CheckIn>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => latest_checkin_sqlite(self.pool.sqlite()?, habit_id).await,
            DatabaseDriver::Mysql => latest_checkin_mysql(self.pool.mysql()?, habit_id).await,
        }
    }

    async fn count_for_habit(&self, habit_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM streaks_checkin WHERE habit_id = ?";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .bind(habit_id)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count check-ins")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .bind(habit_id)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count check-ins")?,
        };
        Ok(count)
    }
}

const INCREMENT_STREAK_SQL: &str =
    "UPDATE streaks_habit_template SET streak = streak + 1, updated_at = ? WHERE id = ?";

// ============================================================================
// SQLite implementations
// ============================================================================

// Dropping `tx` without commit rolls back, so every early return below
// leaves the database untouched.
async fn record_checkin_sqlite(
    pool: &SqlitePool,
    habit_id: i64,
    at: DateTime<Utc>,
) -> Result<CheckIn> {
    let mut tx = pool.begin().await.context("Failed to begin check-in transaction")?;

    let id = sqlx::query("INSERT INTO streaks_checkin (habit_id, created_at) VALUES (?, ?)")
        .bind(habit_id)
        .bind(at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert check-in")?
        .last_insert_rowid();

    let updated = sqlx::query(INCREMENT_STREAK_SQL)
        .bind(at)
        .bind(habit_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment streak")?
        .rows_affected();
    if updated == 0 {
        bail!("Habit {} vanished during check-in", habit_id);
    }

    tx.commit().await.context("Failed to commit check-in")?;

    Ok(CheckIn {
        id,
        habit_id,
        created_at: at,
    })
}

async fn latest_checkin_sqlite(pool: &SqlitePool, habit_id: i64) -> Result<Option<CheckIn>> {
    let row = sqlx::query(
        r#"
        SELECT id, habit_id, created_at
        FROM streaks_checkin
        WHERE habit_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(habit_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get latest check-in")?;

    Ok(row.map(|row| CheckIn {
        id: row.get("id"),
        habit_id: row.get("habit_id"),
        created_at: row.get("created_at"),
    }))
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn record_checkin_mysql(
    pool: &MySqlPool,
    habit_id: i64,
    at: DateTime<Utc>,
) -> Result<CheckIn> {
    let mut tx = pool.begin().await.context("Failed to begin check-in transaction")?;

    let id = sqlx::query("INSERT INTO streaks_checkin (habit_id, created_at) VALUES (?, ?)")
        .bind(habit_id)
        .bind(at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert check-in")?
        .last_insert_id() as i64;

    let updated = sqlx::query(INCREMENT_STREAK_SQL)
        .bind(at)
        .bind(habit_id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment streak")?
        .rows_affected();
    if updated == 0 {
        bail!("Habit {} vanished during check-in", habit_id);
    }

    tx.commit().await.context("Failed to commit check-in")?;

    Ok(CheckIn {
        id,
        habit_id,
        created_at: at,
    })
}

async fn latest_checkin_mysql(pool: &MySqlPool, habit_id: i64) -> Result<Option<CheckIn>> {
    let row = sqlx::query(
        r#"
        SELECT id, habit_id, created_at
        FROM streaks_checkin
        WHERE habit_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(habit_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get latest check-in")?;

    Ok(row.map(|row| CheckIn {
        id: row.get("id"),
        habit_id: row.get("habit_id"),
        created_at: row.get("created_at"),
    }))
}
