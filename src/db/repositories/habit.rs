//! Habit template repository
//!
//! Database operations for habit templates. Streak increments happen in
//! `CheckInRepository::record`, together with the check-in insert; this
//! repository only ever resets a streak.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::HabitTemplate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Habit template repository trait
#[async_trait]
pub trait HabitRepository: Send + Sync {
    /// Create a new habit with a zero streak
    async fn create(&self, habit: &HabitTemplate) -> Result<HabitTemplate>;

    /// Get habit by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<HabitTemplate>>;

    /// List a user's habits ordered by ID
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<HabitTemplate>>;

    /// Set the streak to zero.
    ///
    /// Returns `false` when nothing was written (unknown habit or streak
    /// already zero).
    async fn reset_streak(&self, id: i64, at: DateTime<Utc>) -> Result<bool>;
}

/// SQLx-based habit repository implementation
pub struct SqlxHabitRepository {
    pool: DynDatabasePool,
}

impl SqlxHabitRepository {
    /// Create a new SQLx habit repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn HabitRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl HabitRepository for SqlxHabitRepository {
    async fn create(&self, habit: &HabitTemplate) -> Result<HabitTemplate> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_habit_sqlite(self.pool.sqlite()?, habit).await,
            DatabaseDriver::Mysql => create_habit_mysql(self.pool.mysql()?, habit).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<HabitTemplate>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_habit_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_habit_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<HabitTemplate>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_habits_sqlite(self.pool.sqlite()?, user_id).await,
            DatabaseDriver::Mysql => list_habits_mysql(self.pool.mysql()?, user_id).await,
        }
    }

    async fn reset_streak(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let sql = "UPDATE streaks_habit_template SET streak = 0, updated_at = ? WHERE id = ? AND streak <> 0";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(at)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to reset streak")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(at)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to reset streak")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_habit_sqlite(pool: &SqlitePool, habit: &HabitTemplate) -> Result<HabitTemplate> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO streaks_habit_template (user_id, habit_name, streak, created_at, updated_at)
        VALUES (?, ?, 0, ?, ?)
        "#,
    )
    .bind(habit.user_id)
    .bind(&habit.name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create habit")?;

    Ok(HabitTemplate {
        id: result.last_insert_rowid(),
        user_id: habit.user_id,
        name: habit.name.clone(),
        streak: 0,
        created_at: now,
        updated_at: now,
    })
}

async fn get_habit_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<HabitTemplate>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, habit_name, streak, created_at, updated_at
        FROM streaks_habit_template
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get habit by ID")?;

    Ok(row.as_ref().map(row_to_habit_sqlite))
}

async fn list_habits_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<HabitTemplate>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, habit_name, streak, created_at, updated_at
        FROM streaks_habit_template
        WHERE user_id = ?
        ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list habits")?;

    Ok(rows.iter().map(row_to_habit_sqlite).collect())
}

fn row_to_habit_sqlite(row: &sqlx::sqlite::SqliteRow) -> HabitTemplate {
    HabitTemplate {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("habit_name"),
        streak: row.get("streak"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_habit_mysql(pool: &MySqlPool, habit: &HabitTemplate) -> Result<HabitTemplate> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO streaks_habit_template (user_id, habit_name, streak, created_at, updated_at)
        VALUES (?, ?, 0, ?, ?)
        "#,
    )
    .bind(habit.user_id)
    .bind(&habit.name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create habit")?;

    Ok(HabitTemplate {
        id: result.last_insert_id() as i64,
        user_id: habit.user_id,
        name: habit.name.clone(),
        streak: 0,
        created_at: now,
        updated_at: now,
    })
}

async fn get_habit_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<HabitTemplate>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, habit_name, streak, created_at, updated_at
        FROM streaks_habit_template
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get habit by ID")?;

    Ok(row.as_ref().map(row_to_habit_mysql))
}

async fn list_habits_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<HabitTemplate>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, habit_name, streak, created_at, updated_at
        FROM streaks_habit_template
        WHERE user_id = ?
        ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list habits")?;

    Ok(rows.iter().map(row_to_habit_mysql).collect())
}

fn row_to_habit_mysql(row: &sqlx::mysql::MySqlRow) -> HabitTemplate {
    HabitTemplate {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("habit_name"),
        streak: row.get("streak"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;

    async fn setup() -> (DynDatabasePool, SqlxHabitRepository, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("alice".to_string(), "hash".to_string()))
            .await
            .expect("Failed to create user");
        (pool.clone(), SqlxHabitRepository::new(pool), user.id)
    }

    async fn set_streak(pool: &DynDatabasePool, id: i64, streak: i64) {
        sqlx::query("UPDATE streaks_habit_template SET streak = ? WHERE id = ?")
            .bind(streak)
            .bind(id)
            .execute(pool.sqlite().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_get_habit() {
        let (_pool, repo, user_id) = setup().await;

        let created = repo
            .create(&HabitTemplate::new(user_id, "Read".to_string()))
            .await
            .expect("Failed to create habit");
        assert!(created.id > 0);
        assert_eq!(created.streak, 0);

        let found = repo.get_by_id(created.id).await.unwrap().expect("Habit not found");
        assert_eq!(found.name, "Read");
        assert_eq!(found.user_id, user_id);
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_habit_for_unknown_user_fails() {
        let (_pool, repo, _user_id) = setup().await;

        let result = repo.create(&HabitTemplate::new(999, "Read".to_string())).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_by_user_is_ordered_and_scoped() {
        let (pool, repo, user_id) = setup().await;
        let other = SqlxUserRepository::new(pool)
            .create(&User::new("bob".to_string(), "hash".to_string()))
            .await
            .unwrap();

        repo.create(&HabitTemplate::new(user_id, "Read".to_string())).await.unwrap();
        repo.create(&HabitTemplate::new(other.id, "Swim".to_string())).await.unwrap();
        repo.create(&HabitTemplate::new(user_id, "Run".to_string())).await.unwrap();

        let habits = repo.list_by_user(user_id).await.unwrap();
        let names: Vec<&str> = habits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Read", "Run"]);
    }

    #[tokio::test]
    async fn test_reset_streak() {
        let (pool, repo, user_id) = setup().await;
        let habit = repo.create(&HabitTemplate::new(user_id, "Read".to_string())).await.unwrap();

        // Already zero: nothing written
        assert!(!repo.reset_streak(habit.id, Utc::now()).await.unwrap());

        set_streak(&pool, habit.id, 5).await;
        assert!(repo.reset_streak(habit.id, Utc::now()).await.unwrap());

        let found = repo.get_by_id(habit.id).await.unwrap().unwrap();
        assert_eq!(found.streak, 0);
    }
}
