//! In-process command bus
//!
//! Producers hold a cloneable [`CommandClient`] and await a reply for every
//! command. A single [`CommandBus`] drains the queue and hands each command
//! to the handler on its own task. Ordering between commands is decided by
//! the match store's transaction lock, not by the queue.

use crate::command::handler::CommandHandler;
use crate::command::messages::{Command, CommandEnvelope, CommandResponse};
use crate::error::LeaderboardError;
use crate::types::{MatchSource, Outcome};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A queued command with its reply channel
struct PendingCommand {
    envelope: CommandEnvelope<Command>,
    reply: oneshot::Sender<CommandResponse>,
}

/// Consumer side of the command bus
pub struct CommandBus {
    receiver: mpsc::Receiver<PendingCommand>,
    handler: Arc<dyn CommandHandler>,
}

/// Create a bus and its client with the given queue capacity
pub fn command_channel(handler: Arc<dyn CommandHandler>, capacity: usize) -> (CommandBus, CommandClient) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (CommandBus { receiver, handler }, CommandClient { sender })
}

impl CommandBus {
    /// Consume commands until every client has been dropped
    pub async fn run(mut self) {
        info!("Command bus started");
        while let Some(pending) = self.receiver.recv().await {
            let handler = self.handler.clone();
            tokio::spawn(async move {
                let PendingCommand { envelope, reply } = pending;
                debug!(
                    "Dispatching {} - correlation_id: {}",
                    envelope.payload.kind(),
                    envelope.correlation_id
                );
                let response = handler.handle(envelope.payload).await;
                if reply.send(response).is_err() {
                    debug!(
                        "Caller went away before reply - correlation_id: {}",
                        envelope.correlation_id
                    );
                }
            });
        }
        info!("Command bus stopped, all clients disconnected");
    }

    /// Run the bus on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Producer handle for submitting commands
#[derive(Clone)]
pub struct CommandClient {
    sender: mpsc::Sender<PendingCommand>,
}

impl CommandClient {
    /// Submit a command and wait for its response.
    ///
    /// Always yields a response: a closed bus or a lost reply is reported
    /// as an internal error.
    pub async fn send(&self, command: Command) -> CommandResponse {
        let kind = command.kind();
        let (reply, response) = oneshot::channel();
        let pending = PendingCommand {
            envelope: CommandEnvelope::new(command),
            reply,
        };

        if self.sender.send(pending).await.is_err() {
            warn!("Command bus is closed, dropping {}", kind);
            return CommandResponse::error(&LeaderboardError::Internal {
                message: "command bus is not running".to_string(),
            });
        }

        response.await.unwrap_or_else(|_| {
            warn!("No reply received for {}", kind);
            CommandResponse::error(&LeaderboardError::Internal {
                message: format!("{} was dropped without a response", kind),
            })
        })
    }

    pub async fn submit_match(
        &self,
        model_a: &str,
        model_b: &str,
        outcome: Outcome,
        source: MatchSource,
    ) -> CommandResponse {
        self.send(Command::submit_match(model_a, model_b, outcome, source))
            .await
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> CommandResponse {
        self.send(Command::rename(old_name, new_name)).await
    }

    pub async fn reset(&self) -> CommandResponse {
        self.send(Command::ResetAll).await
    }

    pub async fn import(&self, snapshot: Value) -> CommandResponse {
        self.send(Command::import(snapshot)).await
    }

    pub async fn export(&self) -> CommandResponse {
        self.send(Command::ExportData).await
    }
}
