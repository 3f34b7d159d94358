//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for a specific entity.

pub mod checkin;
pub mod habit;
pub mod user;

pub use checkin::{CheckInRepository, SqlxCheckInRepository};
pub use habit::{HabitRepository, SqlxHabitRepository};
pub use user::{SqlxUserRepository, UserRepository};
