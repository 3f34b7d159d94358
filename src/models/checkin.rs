//! Check-in model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successful check-in on a habit. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: i64,
    pub habit_id: i64,
    pub created_at: DateTime<Utc>,
}
