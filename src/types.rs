//! Common types used throughout the leaderboard service

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use skillratings::elo::EloRating;
use skillratings::Outcomes;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Exact, case-sensitive competitor (model) name
pub type CompetitorName = String;

/// Rating given to a competitor the first time it appears in a match
pub const DEFAULT_SCORE: i64 = 1000;

/// Snapshot schema version written by exports
pub const SNAPSHOT_VERSION: u32 = 1;

/// Winner label stored in match records when neither side won
pub const DRAW_LABEL: &str = "Draw";

/// Resolved result of a head-to-head comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "A")]
    AWins,
    #[serde(rename = "B")]
    BWins,
    #[serde(rename = "Draw")]
    Draw,
}

impl Outcome {
    /// Actual score credited to side A (1, 0.5 or 0)
    pub fn score_a(self) -> f64 {
        match self {
            Outcome::AWins => 1.0,
            Outcome::BWins => 0.0,
            Outcome::Draw => 0.5,
        }
    }

    /// The same result seen from the other side of the table
    pub fn mirrored(self) -> Self {
        match self {
            Outcome::AWins => Outcome::BWins,
            Outcome::BWins => Outcome::AWins,
            Outcome::Draw => Outcome::Draw,
        }
    }

    /// Parse the exact wire name (`"A"`, `"B"` or `"Draw"`).
    ///
    /// `FromStr` is the lenient form for typed input such as the CLI.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "A" => Some(Outcome::AWins),
            "B" => Some(Outcome::BWins),
            DRAW_LABEL => Some(Outcome::Draw),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::AWins => write!(f, "A"),
            Outcome::BWins => write!(f, "B"),
            Outcome::Draw => write!(f, "Draw"),
        }
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Outcome::AWins),
            "b" => Ok(Outcome::BWins),
            "draw" | "tie" => Ok(Outcome::Draw),
            other => Err(format!(
                "unknown outcome '{}', expected one of A, B, Draw",
                other
            )),
        }
    }
}

impl From<Outcome> for Outcomes {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::AWins => Outcomes::WIN,
            Outcome::BWins => Outcomes::LOSS,
            Outcome::Draw => Outcomes::DRAW,
        }
    }
}

/// Who observed a submitted match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchSource {
    Automated,
    Manual,
}

impl std::fmt::Display for MatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchSource::Automated => write!(f, "Automated"),
            MatchSource::Manual => write!(f, "Manual"),
        }
    }
}

/// Rating information for one competitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub score: i64,
    pub votes: u64,
}

impl RatingRecord {
    pub fn new(score: i64) -> Self {
        Self { score, votes: 0 }
    }
}

impl Default for RatingRecord {
    fn default() -> Self {
        Self::new(DEFAULT_SCORE)
    }
}

impl From<RatingRecord> for EloRating {
    fn from(record: RatingRecord) -> Self {
        Self {
            rating: record.score as f64,
        }
    }
}

/// Persisted rating table, keyed by competitor name
pub type RatingTable = BTreeMap<CompetitorName, RatingRecord>;

/// One recorded outcome with the ratings before and after it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub model_a: CompetitorName,
    pub model_b: CompetitorName,
    /// Name of the winning competitor, or `"Draw"`
    pub winner: String,
    pub old_rating_a: i64,
    pub old_rating_b: i64,
    pub new_rating_a: i64,
    pub new_rating_b: i64,
    /// ISO-8601 timestamp of when the match was recorded
    pub timestamp: String,
}

impl MatchRecord {
    pub fn is_draw(&self) -> bool {
        self.winner == DRAW_LABEL
    }

    pub fn involves(&self, name: &str) -> bool {
        self.model_a == name || self.model_b == name
    }
}

/// Ordered match history, oldest first
pub type MatchHistory = Vec<MatchRecord>;

/// Full serialized copy of the leaderboard, used for export and import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub elo_data: RatingTable,
    pub match_history: MatchHistory,
    pub export_date: String,
    pub version: u32,
}

/// What changed in a state-changed notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChangeKind {
    MatchRecorded {
        model_a: CompetitorName,
        model_b: CompetitorName,
        winner: String,
    },
    CompetitorRenamed {
        old_name: CompetitorName,
        new_name: CompetitorName,
    },
    Reset,
    Imported {
        competitors: usize,
        matches: usize,
    },
}

/// Event emitted after every committed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChanged {
    pub change: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

/// ISO-8601 timestamp with millisecond precision and a `Z` suffix
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
