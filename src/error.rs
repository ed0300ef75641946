//! Error types for the leaderboard service
//!
//! This module defines the error taxonomy used by the match store and the
//! command interface. Failures travel as `anyhow::Error` and are classified
//! at the command boundary by downcasting to [`LeaderboardError`].

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific leaderboard scenarios
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeaderboardError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Model '{name}' not found")]
    NotFound { name: String },

    #[error("Model name '{name}' already exists")]
    Conflict { name: String },

    #[error("Invalid import format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Storage failure: {message}")]
    StorageFailure { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LeaderboardError {
    /// Stable machine-readable name of the error category
    pub fn kind(&self) -> &'static str {
        match self {
            LeaderboardError::InvalidInput { .. } => "invalid_input",
            LeaderboardError::NotFound { .. } => "not_found",
            LeaderboardError::Conflict { .. } => "conflict",
            LeaderboardError::InvalidFormat { .. } => "invalid_format",
            LeaderboardError::StorageFailure { .. } => "storage_failure",
            LeaderboardError::Internal { .. } => "internal",
        }
    }

    /// Classify an arbitrary error, treating anything foreign as internal
    pub fn classify(error: &anyhow::Error) -> LeaderboardError {
        match error.downcast_ref::<LeaderboardError>() {
            Some(known) => known.clone(),
            None => LeaderboardError::Internal {
                message: format!("{:#}", error),
            },
        }
    }

    pub(crate) fn invalid_input(reason: impl Into<String>) -> anyhow::Error {
        LeaderboardError::InvalidInput {
            reason: reason.into(),
        }
        .into()
    }

    pub(crate) fn storage(message: impl Into<String>) -> anyhow::Error {
        LeaderboardError::StorageFailure {
            message: message.into(),
        }
        .into()
    }
}
