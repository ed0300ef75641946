//! Rating calculator trait and test implementations
//!
//! The match store only talks to ratings through [`RatingCalculator`], so the
//! concrete formula can be swapped out in tests.

use crate::types::{Outcome, DEFAULT_SCORE};
use serde::{Deserialize, Serialize};

/// New ratings for both sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub new_rating_a: i64,
    pub new_rating_b: i64,
}

/// Trait for calculating rating changes after a head-to-head match
pub trait RatingCalculator: Send + Sync {
    /// Calculate both competitors' new ratings
    ///
    /// # Arguments
    /// * `rating_a` - Current rating of competitor A
    /// * `rating_b` - Current rating of competitor B
    /// * `outcome` - Result from A's point of view
    fn compute_update(&self, rating_a: i64, rating_b: i64, outcome: Outcome) -> RatingUpdate;

    /// Get the initial score for competitors seen for the first time
    fn initial_score(&self) -> i64;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;
}

/// Mock rating calculator for testing
#[derive(Debug, Default)]
pub struct MockRatingCalculator {
    calculation_calls: std::sync::Mutex<Vec<(i64, i64, Outcome)>>,
    fixed_result: std::sync::RwLock<Option<RatingUpdate>>,
}

impl MockRatingCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed result to return for all calculations
    pub fn set_fixed_result(&self, result: RatingUpdate) {
        if let Ok(mut fixed) = self.fixed_result.write() {
            *fixed = Some(result);
        }
    }

    /// Get all calculation calls made (for testing)
    pub fn get_calculation_calls(&self) -> Vec<(i64, i64, Outcome)> {
        self.calculation_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl RatingCalculator for MockRatingCalculator {
    fn compute_update(&self, rating_a: i64, rating_b: i64, outcome: Outcome) -> RatingUpdate {
        if let Ok(mut calls) = self.calculation_calls.lock() {
            calls.push((rating_a, rating_b, outcome));
        }

        if let Ok(fixed) = self.fixed_result.read() {
            if let Some(result) = *fixed {
                return result;
            }
        }

        // Default behavior: no rating change
        RatingUpdate {
            new_rating_a: rating_a,
            new_rating_b: rating_b,
        }
    }

    fn initial_score(&self) -> i64 {
        DEFAULT_SCORE
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "mock",
            "initial_score": DEFAULT_SCORE
        })
    }
}
