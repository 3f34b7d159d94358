//! Habit template model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A habit a user tracks, with its current streak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitTemplate {
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    pub name: String,
    /// Consecutive day windows with at least one check-in. Never negative.
    pub streak: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HabitTemplate {
    pub fn new(user_id: i64, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            name,
            streak: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a habit
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateHabitInput {
    /// Habit name; a missing name is stored as an empty string
    #[serde(default)]
    pub name: Option<String>,
}

impl CreateHabitInput {
    /// Trimmed name, defaulting to the empty string
    pub fn normalized_name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }
}
