//! Rating system using the logistic ELO model
//!
//! This module provides the pure rating update and the calculator seam the
//! match store uses to apply it.

pub mod calculator;
pub mod elo;

// Re-export commonly used types
pub use calculator::{RatingCalculator, RatingUpdate};
pub use elo::{compute_update, EloRatingCalculator, ExtendedEloConfig};
