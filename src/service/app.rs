//! Main application state and service coordination
//!
//! This module wires storage, the match store, the command bus and metrics
//! together. The CLI uses it for one-shot commands; `serve` additionally
//! starts the HTTP endpoints.

use crate::command::bus::{command_channel, CommandClient};
use crate::command::handler::LeaderboardCommandHandler;
use crate::config::{AppConfig, StorageBackend, StorageSettings};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use crate::observer::ArenaObserver;
use crate::rating::EloRatingCalculator;
use crate::storage::{FileStore, InMemoryStore, KeyValueStore};
use crate::store::MatchStore;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    store: Arc<MatchStore>,

    metrics: Arc<MetricsCollector>,

    /// Producer side of the command bus
    client: CommandClient,

    health_server: Option<Arc<HealthServer>>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies.
    ///
    /// The command bus starts consuming immediately.
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} leaderboard", config.service.name);

        let calculator = EloRatingCalculator::new(config.rating.to_elo_config()).map_err(|e| {
            ServiceError::Configuration {
                message: format!("Invalid rating settings: {}", e),
            }
        })?;
        let storage = Self::create_storage(&config.storage);
        let store = Arc::new(MatchStore::new(storage, Arc::new(calculator)));

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let handler = LeaderboardCommandHandler::new(store.clone()).with_metrics(metrics.clone());
        let (bus, client) = command_channel(Arc::new(handler), config.commands.queue_capacity);
        let bus_handle = bus.spawn();

        info!(
            "Leaderboard ready - backend: {:?}, K-factor: {}, queue capacity: {}",
            config.storage.backend, config.rating.k_factor, config.commands.queue_capacity
        );

        Ok(Self {
            config,
            store,
            metrics,
            client,
            health_server: None,
            background_tasks: vec![bus_handle],
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Storage backend described by the settings
    pub fn create_storage(settings: &StorageSettings) -> Arc<dyn KeyValueStore> {
        match settings.backend {
            StorageBackend::Memory => {
                debug!("Using in-memory storage");
                Arc::new(InMemoryStore::new())
            }
            StorageBackend::File => {
                debug!("Using file storage at {}", settings.path.display());
                Arc::new(FileStore::new(settings.path.clone()))
            }
        }
    }

    /// Start the HTTP endpoints
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {} service", self.config.service.name);
        *self.is_running.write().await = true;

        let health_config = HealthServerConfig {
            port: self.config.service.metrics_port,
            ..HealthServerConfig::default()
        };
        let server = Arc::new(
            HealthServer::new(health_config, self.metrics.clone())
                .with_store(self.store.clone())
                .with_client(self.client.clone())
                .with_service_name(&self.config.service.name),
        );

        let task_server = server.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = task_server.start().await {
                error!("Health server failed: {}", e);
            }
        });
        self.background_tasks.push(handle);
        self.health_server = Some(server);

        info!(
            "✅ Endpoints starting on port {}",
            self.config.service.metrics_port
        );
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) {
        info!("Starting graceful shutdown");
        *self.is_running.write().await = false;

        if let Some(server) = self.health_server.take() {
            server.stop();
        }

        let task_count = self.background_tasks.len();
        for task in self.background_tasks.drain(..) {
            task.abort();
        }
        debug!("Aborted {} background tasks", task_count);

        match self.store.export_snapshot().await {
            Ok(snapshot) => info!(
                "Final leaderboard: {} models, {} matches",
                snapshot.elo_data.len(),
                snapshot.match_history.len()
            ),
            Err(e) => error!("Failed to read final leaderboard: {}", e),
        }
        info!("✅ Shutdown completed");
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if the service endpoints are running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn store(&self) -> Arc<MatchStore> {
        self.store.clone()
    }

    pub fn client(&self) -> CommandClient {
        self.client.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Observer that submits automated matches through the command bus
    pub fn observer(&self) -> ArenaObserver {
        ArenaObserver::new(Arc::new(self.client.clone()), self.config.name_timeout())
    }
}
