//! Command and response message definitions and serialization

use crate::error::{LeaderboardError, Result};
use crate::types::{MatchSource, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a match submission. Fields default to empty so that missing
/// data is reported as invalid input rather than as a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPayload {
    #[serde(default)]
    pub model_a: String,
    #[serde(default)]
    pub model_b: String,
    /// `"A"`, `"B"` or `"Draw"`
    #[serde(default)]
    pub winner: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamePayload {
    #[serde(default)]
    pub old_name: String,
    #[serde(default)]
    pub new_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPayload {
    /// Raw import document, schema-checked by the match store
    #[serde(default)]
    pub snapshot: Value,
}

/// Every request an external collaborator can make
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    #[serde(rename = "AUTOMATED_MATCH")]
    AutomatedMatch(MatchPayload),
    #[serde(rename = "MANUAL_MATCH")]
    ManualMatch(MatchPayload),
    #[serde(rename = "RENAME_MODEL")]
    RenameModel(RenamePayload),
    #[serde(rename = "RESET_ALL")]
    ResetAll,
    #[serde(rename = "IMPORT_DATA")]
    ImportData(ImportPayload),
    #[serde(rename = "EXPORT_DATA")]
    ExportData,
}

impl Command {
    /// Build a match submission tagged with its source
    pub fn submit_match(model_a: &str, model_b: &str, outcome: Outcome, source: MatchSource) -> Self {
        let payload = MatchPayload {
            model_a: model_a.to_string(),
            model_b: model_b.to_string(),
            winner: outcome.to_string(),
        };
        match source {
            MatchSource::Automated => Command::AutomatedMatch(payload),
            MatchSource::Manual => Command::ManualMatch(payload),
        }
    }

    pub fn rename(old_name: &str, new_name: &str) -> Self {
        Command::RenameModel(RenamePayload {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        })
    }

    pub fn import(snapshot: Value) -> Self {
        Command::ImportData(ImportPayload { snapshot })
    }

    /// Wire name of the command, also used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Command::AutomatedMatch(_) => "AUTOMATED_MATCH",
            Command::ManualMatch(_) => "MANUAL_MATCH",
            Command::RenameModel(_) => "RENAME_MODEL",
            Command::ResetAll => "RESET_ALL",
            Command::ImportData(_) => "IMPORT_DATA",
            Command::ExportData => "EXPORT_DATA",
        }
    }

    /// Source tag of a match submission
    pub fn source(&self) -> Option<MatchSource> {
        match self {
            Command::AutomatedMatch(_) => Some(MatchSource::Automated),
            Command::ManualMatch(_) => Some(MatchSource::Manual),
            _ => None,
        }
    }
}

/// Terminal status of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Success,
    Error,
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandStatus::Success => write!(f, "success"),
            CommandStatus::Error => write!(f, "error"),
        }
    }
}

/// Structured result returned for every command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    pub message: String,
    /// Error category, present on errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Optional result data (the snapshot for exports)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Success,
            message: message.into(),
            kind: None,
            data: None,
        }
    }

    pub fn success_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::success(message)
        }
    }

    pub fn error(error: &LeaderboardError) -> Self {
        Self {
            status: CommandStatus::Error,
            message: error.to_string(),
            kind: Some(error.kind().to_string()),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }

    /// Error category, if this is an error response
    pub fn error_kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

/// Message envelope with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl<T> CommandEnvelope<T> {
    /// Create a new message envelope
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Deserialize a command from JSON bytes
    pub fn deserialize_command(bytes: &[u8]) -> Result<Command> {
        serde_json::from_slice(bytes).map_err(|e| {
            LeaderboardError::InvalidInput {
                reason: format!("Failed to parse command: {}", e),
            }
            .into()
        })
    }

    /// Serialize a command to JSON bytes
    pub fn serialize_command(command: &Command) -> Result<Vec<u8>> {
        serde_json::to_vec(command)
            .map_err(|e| anyhow::anyhow!("Failed to serialize command: {}", e))
    }

    /// Serialize a response to JSON bytes
    pub fn serialize_response(response: &CommandResponse) -> Result<Vec<u8>> {
        serde_json::to_vec(response)
            .map_err(|e| anyhow::anyhow!("Failed to serialize response: {}", e))
    }

    /// Validate and resolve a match payload into names and an outcome
    pub fn resolve_match(payload: &MatchPayload) -> Result<Outcome> {
        if payload.model_a.trim().is_empty() || payload.model_b.trim().is_empty() {
            return Err(LeaderboardError::invalid_input(
                "Both model names are required",
            ));
        }
        Outcome::from_wire(&payload.winner).ok_or_else(|| {
            LeaderboardError::invalid_input(format!(
                "Invalid winner '{}', expected one of A, B, Draw",
                payload.winner
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_command_wire_format() {
        let command = Command::submit_match("gpt", "claude", Outcome::AWins, MatchSource::Automated);
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(
            value,
            json!({"type": "AUTOMATED_MATCH", "payload": {"modelA": "gpt", "modelB": "claude", "winner": "A"}})
        );
        assert_eq!(command.source(), Some(MatchSource::Automated));
    }

    #[test]
    fn test_deserialize_browser_messages() {
        let manual = MessageUtils::deserialize_command(
            br#"{"type":"MANUAL_MATCH","payload":{"modelA":"a","modelB":"b","winner":"Draw"}}"#,
        )
        .unwrap();
        assert_eq!(manual.kind(), "MANUAL_MATCH");
        assert_eq!(manual.source(), Some(MatchSource::Manual));

        let rename = MessageUtils::deserialize_command(
            br#"{"type":"RENAME_MODEL","payload":{"oldName":"a","newName":"b"}}"#,
        )
        .unwrap();
        assert_eq!(rename, Command::rename("a", "b"));

        let reset = MessageUtils::deserialize_command(br#"{"type":"RESET_ALL"}"#).unwrap();
        assert_eq!(reset, Command::ResetAll);
    }

    #[test]
    fn test_missing_fields_parse_then_fail_validation() {
        let command =
            MessageUtils::deserialize_command(br#"{"type":"AUTOMATED_MATCH","payload":{"modelA":"a"}}"#)
                .unwrap();
        let Command::AutomatedMatch(payload) = command else {
            panic!("expected a match command");
        };
        let err = MessageUtils::resolve_match(&payload).unwrap_err();
        assert_eq!(LeaderboardError::classify(&err).kind(), "invalid_input");
    }

    #[test]
    fn test_unknown_outcome_is_invalid_input() {
        let payload = MatchPayload {
            model_a: "a".to_string(),
            model_b: "b".to_string(),
            winner: "C".to_string(),
        };
        let err = MessageUtils::resolve_match(&payload).unwrap_err();
        assert_eq!(LeaderboardError::classify(&err).kind(), "invalid_input");
    }

    #[test]
    fn test_winner_must_use_exact_wire_name() {
        for winner in ["tie", "draw", "a", " B"] {
            let payload = MatchPayload {
                model_a: "a".to_string(),
                model_b: "b".to_string(),
                winner: winner.to_string(),
            };
            let err = MessageUtils::resolve_match(&payload).unwrap_err();
            assert_eq!(LeaderboardError::classify(&err).kind(), "invalid_input", "{}", winner);
        }

        let payload = MatchPayload {
            model_a: "a".to_string(),
            model_b: "b".to_string(),
            winner: "Draw".to_string(),
        };
        assert_eq!(MessageUtils::resolve_match(&payload).unwrap(), Outcome::Draw);
    }

    #[test]
    fn test_unknown_command_type_rejected() {
        let err = MessageUtils::deserialize_command(br#"{"type":"SELF_DESTRUCT"}"#).unwrap_err();
        assert_eq!(LeaderboardError::classify(&err).kind(), "invalid_input");
    }

    #[test]
    fn test_response_shapes() {
        let ok = CommandResponse::success("Model renamed successfully.");
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "success", "message": "Model renamed successfully."})
        );

        let err = CommandResponse::error(&LeaderboardError::NotFound {
            name: "x".to_string(),
        });
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "not_found");
        assert!(!err.is_success());
    }

    #[test]
    fn test_envelope_has_correlation_id() {
        let envelope = CommandEnvelope::new(Command::ExportData);
        assert!(!envelope.correlation_id.is_empty());
    }
}
