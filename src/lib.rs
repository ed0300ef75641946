//! Arena ELO - local leaderboard for head-to-head model comparisons
//!
//! This crate keeps an ELO-style leaderboard of votes observed on a model
//! comparison arena or entered by hand, with transactional storage,
//! rename/import/export, and a command interface that always answers.

pub mod command;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod metrics;
pub mod observer;
pub mod rating;
pub mod service;
pub mod storage;
pub mod store;
pub mod types;

// Re-export commonly used types and traits
pub use error::{LeaderboardError, Result};
pub use types::*;

// Re-export key components
pub use command::{Command, CommandClient, CommandResponse};
pub use store::MatchStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
