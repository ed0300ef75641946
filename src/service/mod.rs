//! Service layer for the leaderboard
//!
//! This module contains the application state, component wiring and health
//! checks used by the binary.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus, LeaderboardStats};
