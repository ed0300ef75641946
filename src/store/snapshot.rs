//! Snapshot import validation and export helpers

use crate::error::{LeaderboardError, Result};
use crate::store::normalize::{json_type_name, parse_history, parse_rating_table};
use crate::types::{iso_timestamp, MatchHistory, RatingTable, Snapshot, SNAPSHOT_VERSION};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Build an export snapshot of the given collections
pub fn build_snapshot(elo_data: RatingTable, match_history: MatchHistory, at: DateTime<Utc>) -> Snapshot {
    Snapshot {
        elo_data,
        match_history,
        export_date: iso_timestamp(at),
        version: SNAPSHOT_VERSION,
    }
}

/// Validate an import document and turn it into a snapshot.
///
/// The document must be an object with an `eloData` object and a
/// `matchHistory` array. `exportDate` and `version` are optional; a version
/// other than the current one is rejected.
pub fn parse_snapshot(document: &Value, default_score: i64) -> Result<Snapshot> {
    let object = document
        .as_object()
        .ok_or_else(|| invalid_format(format!(
            "expected a JSON object with eloData and matchHistory, found {}",
            json_type_name(document)
        )))?;

    let elo_value = object
        .get("eloData")
        .filter(|v| v.is_object())
        .ok_or_else(|| invalid_format("missing eloData object"))?;
    let history_value = object
        .get("matchHistory")
        .filter(|v| v.is_array())
        .ok_or_else(|| invalid_format("missing matchHistory array"))?;

    let version = match object.get("version") {
        None | Some(Value::Null) => SNAPSHOT_VERSION,
        Some(Value::Number(n)) if n.as_u64() == Some(SNAPSHOT_VERSION as u64) => SNAPSHOT_VERSION,
        Some(other) => {
            return Err(invalid_format(format!(
                "unsupported snapshot version {}",
                other
            )))
        }
    };

    let export_date = object
        .get("exportDate")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default();

    let elo_data = parse_rating_table(elo_value, default_score).map_err(invalid_format)?;
    let match_history = parse_history(history_value).map_err(invalid_format)?;

    Ok(Snapshot {
        elo_data,
        match_history,
        export_date,
        version,
    })
}

/// Parse an import file's text
pub fn parse_snapshot_str(text: &str, default_score: i64) -> Result<Snapshot> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| invalid_format(format!("file is not valid JSON: {}", e)))?;
    parse_snapshot(&document, default_score)
}

/// Pretty JSON text for an export file
pub fn to_pretty_json(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string_pretty(snapshot)
        .map_err(|e| anyhow::anyhow!("Failed to serialize snapshot: {}", e))
}

/// Default export file name, e.g. `arena-elo_backup_2024-05-01.json`
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("arena-elo_backup_{}.json", at.format("%Y-%m-%d"))
}

fn invalid_format(reason: impl Into<String>) -> anyhow::Error {
    LeaderboardError::InvalidFormat {
        reason: reason.into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn kind_of(err: &anyhow::Error) -> &'static str {
        LeaderboardError::classify(err).kind()
    }

    #[test]
    fn test_minimal_document_accepted() {
        let snapshot = parse_snapshot(&json!({"eloData": {}, "matchHistory": []}), 1000).unwrap();
        assert!(snapshot.elo_data.is_empty());
        assert!(snapshot.match_history.is_empty());
        assert_eq!(snapshot.version, 1);
    }

    #[test]
    fn test_missing_collections_rejected() {
        let err = parse_snapshot(&json!({"matchHistory": []}), 1000).unwrap_err();
        assert_eq!(kind_of(&err), "invalid_format");

        let err = parse_snapshot(&json!({"eloData": {}}), 1000).unwrap_err();
        assert_eq!(kind_of(&err), "invalid_format");

        let err = parse_snapshot(&json!({"eloData": [], "matchHistory": []}), 1000).unwrap_err();
        assert_eq!(kind_of(&err), "invalid_format");

        let err = parse_snapshot(&json!([1, 2]), 1000).unwrap_err();
        assert_eq!(kind_of(&err), "invalid_format");
    }

    #[test]
    fn test_future_version_rejected() {
        let err = parse_snapshot(&json!({"eloData": {}, "matchHistory": [], "version": 2}), 1000).unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot version"));
    }

    #[test]
    fn test_invalid_json_text_rejected() {
        let err = parse_snapshot_str("{ nope", 1000).unwrap_err();
        assert_eq!(kind_of(&err), "invalid_format");
    }

    #[test]
    fn test_export_then_parse_is_identity() {
        let mut table = RatingTable::new();
        table.insert("m".to_string(), crate::types::RatingRecord { score: 1016, votes: 1 });
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let snapshot = build_snapshot(table, Vec::new(), at);

        let text = to_pretty_json(&snapshot).unwrap();
        let parsed = parse_snapshot_str(&text, 1000).unwrap();
        assert_eq!(parsed, snapshot);
        assert_eq!(parsed.export_date, "2024-05-01T08:30:00.000Z");
    }

    #[test]
    fn test_export_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap();
        assert_eq!(export_file_name(at), "arena-elo_backup_2024-05-01.json");
    }
}
