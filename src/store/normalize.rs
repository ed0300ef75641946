//! Read-boundary normalization of persisted and imported collections
//!
//! Older data stored a competitor's rating as a bare number. Those entries
//! become `{score, votes: 0}` here and nowhere else. Entries of any other
//! unrecognized shape start over at the default score with no votes.

use crate::rating::elo::round_half_up;
use crate::types::{MatchHistory, MatchRecord, RatingRecord, RatingTable};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Any shape a rating entry has been persisted in
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredRating {
    Record {
        #[serde(default)]
        score: Option<f64>,
        #[serde(default)]
        votes: Option<f64>,
    },
    Legacy(f64),
}

impl StoredRating {
    fn into_record(self, default_score: i64) -> RatingRecord {
        match self {
            StoredRating::Record { score, votes } => RatingRecord {
                score: score
                    .filter(|s| s.is_finite())
                    .map(round_half_up)
                    .unwrap_or(default_score),
                votes: votes
                    .filter(|v| v.is_finite() && *v > 0.0)
                    .map(|v| v as u64)
                    .unwrap_or(0),
            },
            StoredRating::Legacy(score) if score.is_finite() => RatingRecord::new(round_half_up(score)),
            StoredRating::Legacy(_) => RatingRecord::new(default_score),
        }
    }
}

/// Parse a rating table, coercing legacy and unrecognized entries.
///
/// `null` reads as an empty table. Anything other than an object is rejected.
pub fn parse_rating_table(value: &Value, default_score: i64) -> Result<RatingTable, String> {
    let entries = match value {
        Value::Null => return Ok(RatingTable::new()),
        Value::Object(entries) => entries,
        other => {
            return Err(format!(
                "expected eloData to be an object, found {}",
                json_type_name(other)
            ))
        }
    };

    let mut table = RatingTable::new();
    for (name, raw) in entries {
        let record = match StoredRating::deserialize(raw) {
            Ok(stored) => stored.into_record(default_score),
            Err(_) => {
                warn!(
                    "Rating entry for '{}' is not a number or record ({}), resetting to {}",
                    name,
                    json_type_name(raw),
                    default_score
                );
                RatingRecord::new(default_score)
            }
        };
        table.insert(name.clone(), record);
    }
    Ok(table)
}

/// Parse the ordered match history. `null` reads as an empty history.
pub fn parse_history(value: &Value) -> Result<MatchHistory, String> {
    let items = match value {
        Value::Null => return Ok(MatchHistory::new()),
        Value::Array(items) => items,
        other => {
            return Err(format!(
                "expected matchHistory to be an array, found {}",
                json_type_name(other)
            ))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            MatchRecord::deserialize(item)
                .map_err(|e| format!("match record #{} is malformed: {}", index, e))
        })
        .collect()
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
