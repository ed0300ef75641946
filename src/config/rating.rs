//! Rating system configuration

use crate::rating::elo::{ExtendedEloConfig, DEFAULT_K_FACTOR};
use crate::types::DEFAULT_SCORE;
use serde::{Deserialize, Serialize};
use skillratings::elo::EloConfig;

/// Rating engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingSettings {
    /// K-factor applied to every match
    pub k_factor: f64,
    /// Score of a competitor on first appearance
    pub default_score: i64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
            default_score: DEFAULT_SCORE,
        }
    }
}

impl RatingSettings {
    /// Calculator configuration for these settings
    pub fn to_elo_config(&self) -> ExtendedEloConfig {
        ExtendedEloConfig {
            elo_config: EloConfig { k: self.k_factor },
            initial_score: self.default_score,
        }
    }
}
