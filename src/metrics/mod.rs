//! Metrics and monitoring for the leaderboard
//!
//! Prometheus collection for commands and matches, plus the local HTTP
//! server exposing health, metrics and leaderboard views.

pub mod collector;
pub mod health;

pub use collector::MetricsCollector;
pub use health::{HealthServer, HealthServerConfig, HealthServerState};
