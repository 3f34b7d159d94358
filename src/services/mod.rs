//! Services layer - Business logic
//!
//! This module contains the business logic of the Streaks service.
//! Services are responsible for:
//! - Implementing business rules (streak resets, check-in ownership)
//! - Coordinating between repositories and the session manager
//! - Handling validation and error cases

pub mod habit;
pub mod password;
pub mod session;
pub mod streak;
pub mod user;

pub use habit::{CheckInOutcome, HabitService, HabitServiceError};
pub use password::{hash_password, verify_password};
pub use session::{IssuedToken, SessionError, SessionManager, SESSION_COOKIE};
pub use streak::{format_remaining, DayPolicy, DayWindow};
pub use user::{LoginInput, LoginOutcome, RegisterInput, UserService, UserServiceError};
