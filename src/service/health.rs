//! Health checks for the leaderboard service
//!
//! A check reads both collections through the match store. Unreadable
//! storage makes the service unhealthy; readable but inconsistent data
//! (a match that names a competitor missing from the rating table, as can
//! happen after importing a hand-edited file) makes it degraded.

use crate::store::MatchStore;
use crate::types::Snapshot;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: LeaderboardStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Leaderboard statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardStats {
    pub competitors: usize,
    pub matches: usize,
    /// Highest rated competitor
    pub leader: Option<String>,
}

impl HealthCheck {
    /// Perform a health check of the store
    pub async fn check(store: &MatchStore, service: &str) -> Self {
        let start = Instant::now();
        let mut checks = Vec::new();

        let (storage_check, snapshot) = match store.export_snapshot().await {
            Ok(snapshot) => (
                ComponentCheck {
                    name: "storage".to_string(),
                    status: HealthStatus::Healthy,
                    message: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                },
                Some(snapshot),
            ),
            Err(e) => {
                error!("Storage health check failed: {}", e);
                (
                    ComponentCheck {
                        name: "storage".to_string(),
                        status: HealthStatus::Unhealthy,
                        message: Some(e.to_string()),
                        duration_ms: start.elapsed().as_millis() as u64,
                    },
                    None,
                )
            }
        };
        checks.push(storage_check);

        let stats = match &snapshot {
            Some(snapshot) => {
                checks.push(Self::check_consistency(snapshot));
                Self::gather_stats(snapshot)
            }
            None => LeaderboardStats::default(),
        };

        let status = checks
            .iter()
            .map(|c| c.status)
            .fold(HealthStatus::Healthy, worst);
        debug!("Health check completed: {}", status);

        HealthCheck {
            status,
            service: service.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        }
    }

    /// Every name in the history must still have a rating record
    fn check_consistency(snapshot: &Snapshot) -> ComponentCheck {
        let start = Instant::now();
        let orphans: BTreeSet<&str> = snapshot
            .match_history
            .iter()
            .flat_map(|record| [record.model_a.as_str(), record.model_b.as_str()])
            .filter(|name| !snapshot.elo_data.contains_key(*name))
            .collect();

        let (status, message) = if orphans.is_empty() {
            (HealthStatus::Healthy, None)
        } else {
            let names: Vec<_> = orphans.into_iter().collect();
            (
                HealthStatus::Degraded,
                Some(format!(
                    "History references unrated models: {}",
                    names.join(", ")
                )),
            )
        };

        ComponentCheck {
            name: "consistency".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_stats(snapshot: &Snapshot) -> LeaderboardStats {
        let leader = crate::leaderboard::standings(&snapshot.elo_data)
            .into_iter()
            .next()
            .map(|standing| standing.name);

        LeaderboardStats {
            competitors: snapshot.elo_data.len(),
            matches: snapshot.match_history.len(),
            leader,
        }
    }

    /// Convert health check to a pretty JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

fn worst(a: HealthStatus, b: HealthStatus) -> HealthStatus {
    match (a, b) {
        (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
        (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}
