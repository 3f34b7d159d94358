//! Habit service
//!
//! Habit creation, listing and check-ins. Listing runs the streak
//! evaluator first, so callers never see a streak that should already have
//! been reset.

use crate::db::repositories::{CheckInRepository, HabitRepository};
use crate::models::{CheckIn, CreateHabitInput, HabitTemplate};
use crate::services::streak::DayPolicy;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Error types for habit service operations
#[derive(Debug, thiserror::Error)]
pub enum HabitServiceError {
    /// Habit does not exist or belongs to another user
    #[error("Habit not found: {0}")]
    NotFound(i64),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of a successful check-in
#[derive(Debug, Clone)]
pub struct CheckInOutcome {
    pub checkin: CheckIn,
    /// The habit after its streak was incremented
    pub habit: HabitTemplate,
}

/// Habit service
pub struct HabitService {
    habit_repo: Arc<dyn HabitRepository>,
    checkin_repo: Arc<dyn CheckInRepository>,
    policy: DayPolicy,
}

impl HabitService {
    /// Create a new habit service
    pub fn new(
        habit_repo: Arc<dyn HabitRepository>,
        checkin_repo: Arc<dyn CheckInRepository>,
        policy: DayPolicy,
    ) -> Self {
        Self {
            habit_repo,
            checkin_repo,
            policy,
        }
    }

    /// Day-window policy used by the evaluator
    pub fn policy(&self) -> &DayPolicy {
        &self.policy
    }

    /// Create a habit for a user with a zero streak
    pub async fn create(
        &self,
        user_id: i64,
        input: &CreateHabitInput,
    ) -> Result<HabitTemplate, HabitServiceError> {
        let habit = HabitTemplate::new(user_id, input.normalized_name());

        let created = self
            .habit_repo
            .create(&habit)
            .await
            .context("Failed to create habit")?;

        tracing::debug!("User {} created habit {}", user_id, created.id);
        Ok(created)
    }

    /// Reset every broken streak of a user's habits.
    ///
    /// Returns the number of habits reset. Habits already at zero are not
    /// written.
    pub async fn evaluate_streaks(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<usize, HabitServiceError> {
        let habits = self
            .habit_repo
            .list_by_user(user_id)
            .await
            .context("Failed to list habits")?;

        let mut reset = 0;
        for habit in habits.iter().filter(|h| h.streak != 0) {
            let last = self
                .checkin_repo
                .latest_for_habit(habit.id)
                .await
                .context("Failed to get latest check-in")?
                .map(|c| c.created_at);

            if self.policy.should_reset(last, now)
                && self
                    .habit_repo
                    .reset_streak(habit.id, now)
                    .await
                    .context("Failed to reset streak")?
            {
                tracing::info!(
                    "Reset streak of habit {} (was {}, last check-in {:?})",
                    habit.id,
                    habit.streak,
                    last
                );
                reset += 1;
            }
        }

        Ok(reset)
    }

    /// A user's habits ordered by ID, after the evaluator pass
    pub async fn list_for_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<HabitTemplate>, HabitServiceError> {
        self.evaluate_streaks(user_id, now).await?;

        let habits = self
            .habit_repo
            .list_by_user(user_id)
            .await
            .context("Failed to list habits")?;
        Ok(habits)
    }

    /// Record a check-in and increment the streak in one transaction.
    ///
    /// Fails with `NotFound` (writing nothing) when the habit does not exist
    /// or is owned by someone else.
    pub async fn check_in(
        &self,
        user_id: i64,
        habit_id: i64,
        now: DateTime<Utc>,
    ) -> Result<CheckInOutcome, HabitServiceError> {
        let habit = self
            .habit_repo
            .get_by_id(habit_id)
            .await
            .context("Failed to get habit")?
            .filter(|h| h.user_id == user_id)
            .ok_or(HabitServiceError::NotFound(habit_id))?;

        let checkin = self.checkin_repo.record(habit.id, now).await.map_err(|e| {
            tracing::error!("Check-in on habit {} rolled back: {:#}", habit.id, e);
            HabitServiceError::InternalError(e)
        })?;

        let habit = self
            .habit_repo
            .get_by_id(habit.id)
            .await
            .context("Failed to reload habit")?
            .ok_or(HabitServiceError::NotFound(habit_id))?;

        Ok(CheckInOutcome { checkin, habit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCheckInRepository, SqlxHabitRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::User;
    use chrono::Duration;

    struct Fixture {
        pool: DynDatabasePool,
        service: HabitService,
        checkins: Arc<dyn CheckInRepository>,
        user_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("alice".to_string(), "hash".to_string()))
            .await
            .unwrap();

        let checkins = SqlxCheckInRepository::boxed(pool.clone());
        let service = HabitService::new(
            SqlxHabitRepository::boxed(pool.clone()),
            checkins.clone(),
            DayPolicy::new(-420),
        );
        Fixture {
            pool,
            service,
            checkins,
            user_id: user.id,
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn named(name: &str) -> CreateHabitInput {
        CreateHabitInput {
            name: Some(name.to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_habit_defaults() {
        let fx = setup().await;

        let habit = fx
            .service
            .create(fx.user_id, &CreateHabitInput::default())
            .await
            .unwrap();

        assert_eq!(habit.name, "");
        assert_eq!(habit.streak, 0);
        assert_eq!(habit.user_id, fx.user_id);
    }

    #[tokio::test]
    async fn test_check_in_increments_count_and_streak() {
        let fx = setup().await;
        let habit = fx.service.create(fx.user_id, &named("Read")).await.unwrap();

        let outcome = fx
            .service
            .check_in(fx.user_id, habit.id, Utc::now())
            .await
            .expect("Check-in failed");

        assert_eq!(outcome.checkin.habit_id, habit.id);
        assert_eq!(outcome.habit.streak, 1);
        assert_eq!(fx.checkins.count_for_habit(habit.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_check_in_on_foreign_habit_is_not_found() {
        let fx = setup().await;
        let bob = SqlxUserRepository::new(fx.pool.clone())
            .create(&User::new("bob".to_string(), "hash".to_string()))
            .await
            .unwrap();
        let habit = fx.service.create(bob.id, &named("Swim")).await.unwrap();

        let foreign = fx.service.check_in(fx.user_id, habit.id, Utc::now()).await;
        let missing = fx.service.check_in(fx.user_id, 999, Utc::now()).await;

        assert!(matches!(foreign, Err(HabitServiceError::NotFound(_))));
        assert!(matches!(missing, Err(HabitServiceError::NotFound(999))));
        assert_eq!(fx.checkins.count_for_habit(habit.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_keeps_streak_checked_in_today() {
        let fx = setup().await;
        let habit = fx.service.create(fx.user_id, &named("Read")).await.unwrap();
        let now = at("2024-03-10T15:00:00Z");
        fx.service
            .check_in(fx.user_id, habit.id, at("2024-03-10T08:00:00Z"))
            .await
            .unwrap();

        let habits = fx.service.list_for_user(fx.user_id, now).await.unwrap();

        assert_eq!(habits[0].streak, 1);
    }

    #[tokio::test]
    async fn test_list_keeps_streak_checked_in_yesterday() {
        let fx = setup().await;
        let habit = fx.service.create(fx.user_id, &named("Read")).await.unwrap();
        fx.service
            .check_in(fx.user_id, habit.id, at("2024-03-09T10:00:00Z"))
            .await
            .unwrap();

        let habits = fx
            .service
            .list_for_user(fx.user_id, at("2024-03-10T15:00:00Z"))
            .await
            .unwrap();

        assert_eq!(habits[0].streak, 1);
    }

    #[tokio::test]
    async fn test_list_resets_streak_after_missed_day() {
        let fx = setup().await;
        let kept = fx.service.create(fx.user_id, &named("Read")).await.unwrap();
        let broken = fx.service.create(fx.user_id, &named("Run")).await.unwrap();
        let now = at("2024-03-10T15:00:00Z");

        for day in 0..3 {
            fx.service
                .check_in(fx.user_id, broken.id, at("2024-03-06T12:00:00Z") + Duration::days(day))
                .await
                .unwrap();
        }
        fx.service.check_in(fx.user_id, kept.id, now).await.unwrap();

        assert_eq!(fx.service.evaluate_streaks(fx.user_id, now).await.unwrap(), 1);
        let habits = fx.service.list_for_user(fx.user_id, now).await.unwrap();

        assert_eq!(habits[0].id, kept.id);
        assert_eq!(habits[0].streak, 1);
        assert_eq!(habits[1].id, broken.id);
        assert_eq!(habits[1].streak, 0);
        // Check-ins themselves are never removed
        assert_eq!(fx.checkins.count_for_habit(broken.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_evaluate_skips_zero_streaks() {
        let fx = setup().await;
        fx.service.create(fx.user_id, &named("Never")).await.unwrap();

        let reset = fx
            .service
            .evaluate_streaks(fx.user_id, Utc::now())
            .await
            .unwrap();

        assert_eq!(reset, 0);
    }
}
