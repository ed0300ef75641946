//! Logistic ELO rating engine
//!
//! Pure functions that compute post-match ratings for two competitors, and
//! the [`EloRatingCalculator`] that exposes them through the
//! [`RatingCalculator`] seam. Configuration reuses the skillratings
//! `EloConfig` so the K-factor travels in the same shape the crate expects.

use crate::rating::calculator::{RatingCalculator, RatingUpdate};
use crate::types::{Outcome, DEFAULT_SCORE};
use serde::{Deserialize, Serialize};
use skillratings::elo::EloConfig;

/// K-factor applied to every match
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Rating spread at which the stronger side is expected to score ~91%
const LOGISTIC_SCALE: f64 = 400.0;

/// Expected score of a competitor rated `rating` against one rated `opponent`
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / LOGISTIC_SCALE))
}

/// Round to the nearest integer, halves toward positive infinity
///
/// Matches browser `Math.round`, so `-2.5` becomes `-2` rather than `-3`.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Compute both competitors' new ratings after a single match.
///
/// B's expected score is computed from its own perspective rather than as
/// `1 - expected_a`, and each side is rounded independently. This keeps
/// `compute_update(a, b, AWins)` an exact mirror of `compute_update(b, a, BWins)`.
/// No floor or ceiling is applied.
pub fn compute_update(rating_a: i64, rating_b: i64, outcome: Outcome, k_factor: f64) -> RatingUpdate {
    let (ra, rb) = (rating_a as f64, rating_b as f64);

    let expected_a = expected_score(ra, rb);
    let expected_b = expected_score(rb, ra);

    let score_a = outcome.score_a();
    let score_b = 1.0 - score_a;

    RatingUpdate {
        new_rating_a: round_half_up(ra + k_factor * (score_a - expected_a)),
        new_rating_b: round_half_up(rb + k_factor * (score_b - expected_b)),
    }
}

/// ELO configuration with the leaderboard's extra parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedEloConfig {
    /// Core ELO parameters (K-factor)
    pub elo_config: EloConfig,
    /// Score assigned to a competitor on first appearance
    pub initial_score: i64,
}

impl Default for ExtendedEloConfig {
    fn default() -> Self {
        Self {
            elo_config: EloConfig {
                k: DEFAULT_K_FACTOR,
            },
            initial_score: DEFAULT_SCORE,
        }
    }
}

impl ExtendedEloConfig {
    pub fn with_k_factor(k_factor: f64) -> Self {
        Self {
            elo_config: EloConfig { k: k_factor },
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> crate::error::Result<()> {
        if !self.elo_config.k.is_finite() || self.elo_config.k <= 0.0 {
            return Err(anyhow::anyhow!(
                "K-factor must be a positive finite number, got {}",
                self.elo_config.k
            ));
        }
        Ok(())
    }
}

/// ELO rating calculator implementation
#[derive(Debug, Clone)]
pub struct EloRatingCalculator {
    config: ExtendedEloConfig,
}

impl EloRatingCalculator {
    /// Create a new ELO rating calculator
    pub fn new(config: ExtendedEloConfig) -> crate::error::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn k_factor(&self) -> f64 {
        self.config.elo_config.k
    }
}

impl Default for EloRatingCalculator {
    fn default() -> Self {
        Self {
            config: ExtendedEloConfig::default(),
        }
    }
}

impl RatingCalculator for EloRatingCalculator {
    fn compute_update(&self, rating_a: i64, rating_b: i64, outcome: Outcome) -> RatingUpdate {
        compute_update(rating_a, rating_b, outcome, self.config.elo_config.k)
    }

    fn initial_score(&self) -> i64 {
        self.config.initial_score
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "elo",
            "k_factor": self.config.elo_config.k,
            "initial_score": self.config.initial_score
        })
    }
}
