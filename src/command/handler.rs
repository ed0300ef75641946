//! Command handlers that turn requests into match store operations
//!
//! Every command produces a [`CommandResponse`]. Failures of any kind,
//! including panics inside an operation, are reported as error responses
//! and never escape to the caller.

use crate::command::messages::{Command, CommandResponse, MessageUtils};
use crate::error::{LeaderboardError, Result};
use crate::metrics::MetricsCollector;
use crate::store::MatchStore;
use crate::types::MatchSource;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Trait defining the interface for handling leaderboard commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a command and produce its structured response
    async fn handle(&self, command: Command) -> CommandResponse;

    /// Handle a raw JSON message. Unparseable input yields an error response.
    async fn handle_raw(&self, content: &[u8]) -> CommandResponse {
        match MessageUtils::deserialize_command(content) {
            Ok(command) => self.handle(command).await,
            Err(e) => {
                warn!("Rejected malformed command ({} bytes): {}", content.len(), e);
                CommandResponse::error(&LeaderboardError::classify(&e))
            }
        }
    }
}

/// Handler backed by the match store
pub struct LeaderboardCommandHandler {
    store: Arc<MatchStore>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl LeaderboardCommandHandler {
    pub fn new(store: Arc<MatchStore>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &Arc<MatchStore> {
        &self.store
    }

    async fn refresh_gauges(&self) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match self.store.export_snapshot().await {
            Ok(snapshot) => {
                metrics.set_totals(snapshot.elo_data.len(), snapshot.match_history.len())
            }
            Err(e) => warn!("Failed to refresh leaderboard gauges: {}", e),
        }
    }
}

#[async_trait]
impl CommandHandler for LeaderboardCommandHandler {
    async fn handle(&self, command: Command) -> CommandResponse {
        let start_time = Instant::now();
        let kind = command.kind();
        let source = command.source();

        // The operation runs in its own task so a panic surfaces as a JoinError
        let store = self.store.clone();
        let outcome = tokio::spawn(async move { execute(&store, command).await }).await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let classified = LeaderboardError::classify(&e);
                warn!("Command {} failed [{}]: {}", kind, classified.kind(), classified);
                CommandResponse::error(&classified)
            }
            Err(join_error) => {
                error!("Command {} aborted unexpectedly: {}", kind, join_error);
                CommandResponse::error(&LeaderboardError::Internal {
                    message: format!("{} aborted unexpectedly", kind),
                })
            }
        };

        let elapsed = start_time.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_command(kind, response.status, elapsed);
            if response.is_success() {
                if let Some(source) = source {
                    metrics.record_match(source);
                }
            }
        }
        if response.is_success() {
            self.refresh_gauges().await;
        }

        info!(
            "Command {} handled - status: {}, time: {:.2}ms",
            kind,
            response.status,
            elapsed.as_secs_f64() * 1000.0
        );
        response
    }
}

async fn execute(store: &MatchStore, command: Command) -> Result<CommandResponse> {
    match command {
        Command::AutomatedMatch(payload) | Command::ManualMatch(payload) => {
            let outcome = MessageUtils::resolve_match(&payload)?;
            let record = store
                .record_match(&payload.model_a, &payload.model_b, outcome)
                .await?;
            Ok(CommandResponse::success(format!(
                "Match recorded: {} vs {} (winner: {})",
                record.model_a, record.model_b, record.winner
            )))
        }
        Command::RenameModel(payload) => {
            let rewritten = store
                .rename_competitor(&payload.old_name, &payload.new_name)
                .await?;
            Ok(CommandResponse::success(format!(
                "Model renamed successfully ({} matches updated).",
                rewritten
            )))
        }
        Command::ResetAll => {
            store.reset_all().await?;
            Ok(CommandResponse::success("All data has been reset."))
        }
        Command::ImportData(payload) => {
            let summary = store.import_snapshot(&payload.snapshot).await?;
            Ok(CommandResponse::success(format!(
                "Data imported successfully: {} models, {} matches.",
                summary.competitors, summary.matches
            )))
        }
        Command::ExportData => {
            let snapshot = store.export_snapshot().await?;
            let data = serde_json::to_value(&snapshot)
                .map_err(|e| anyhow::anyhow!("Failed to serialize snapshot: {}", e))?;
            Ok(CommandResponse::success_with_data(
                format!(
                    "Exported {} models and {} matches.",
                    snapshot.elo_data.len(),
                    snapshot.match_history.len()
                ),
                data,
            ))
        }
    }
}

/// Mock command handler for testing
pub struct MockCommandHandler {
    pub received_commands: Arc<tokio::sync::Mutex<Vec<Command>>>,
    response: std::sync::Mutex<Option<CommandResponse>>,
}

impl Default for MockCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommandHandler {
    pub fn new() -> Self {
        Self {
            received_commands: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            response: std::sync::Mutex::new(None),
        }
    }

    /// Respond to every command with a fixed response
    pub fn set_response(&self, response: CommandResponse) {
        if let Ok(mut slot) = self.response.lock() {
            *slot = Some(response);
        }
    }

    /// Match submissions received so far, tagged with their source
    pub async fn received_matches(&self) -> Vec<(MatchSource, String, String)> {
        self.received_commands
            .lock()
            .await
            .iter()
            .filter_map(|command| match command {
                Command::AutomatedMatch(p) => {
                    Some((MatchSource::Automated, p.model_a.clone(), p.model_b.clone()))
                }
                Command::ManualMatch(p) => {
                    Some((MatchSource::Manual, p.model_a.clone(), p.model_b.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl CommandHandler for MockCommandHandler {
    async fn handle(&self, command: Command) -> CommandResponse {
        let kind = command.kind();
        self.received_commands.lock().await.push(command);
        self.response
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or_else(|| CommandResponse::success(format!("{} accepted", kind)))
    }
}
