//! Streaks - a small habit tracker
//!
//! Users register, create habits and check in on them once a day. Each
//! check-in extends the habit's streak; missing a whole day resets it.
//! Sessions are signed tokens kept in a cookie.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
