//! Data models
//!
//! This module contains all data structures used throughout the Streaks service.
//! Models represent:
//! - Database entities (User, HabitTemplate, CheckIn)
//! - Session token claims
//! - Service inputs

mod checkin;
mod habit;
mod session;
mod user;

pub use checkin::CheckIn;
pub use habit::{CreateHabitInput, HabitTemplate};
pub use session::SessionClaims;
pub use user::User;
