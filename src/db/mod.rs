//! Database layer
//!
//! Storage for users, habit templates and check-ins. Two backends are
//! supported behind the same `DatabasePool` trait:
//! - SQLite (default, a single file next to the binary)
//! - MySQL
//!
//! The driver is chosen by `database.driver` in the configuration.
//!
//! # Usage
//!
//! ```ignore
//! use streaks::config::DatabaseConfig;
//! use streaks::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
