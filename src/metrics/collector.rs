//! Metrics collection using Prometheus
//!
//! Counters for handled commands and recorded matches, a latency histogram
//! per command kind, and gauges describing the size of the leaderboard.

use crate::command::messages::CommandStatus;
use crate::types::MatchSource;
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the leaderboard service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Commands handled, by kind and terminal status
    pub commands_total: IntCounterVec,

    /// Matches successfully recorded, by source
    pub matches_recorded_total: IntCounterVec,

    /// Time spent handling a command
    pub command_duration_seconds: HistogramVec,

    /// Competitors currently on the leaderboard
    pub competitors: IntGauge,

    /// Entries in the match history
    pub history_length: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let commands_total = IntCounterVec::new(
            Opts::new("arena_elo_commands_total", "Total commands handled"),
            &["kind", "status"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let matches_recorded_total = IntCounterVec::new(
            Opts::new(
                "arena_elo_matches_recorded_total",
                "Total matches recorded",
            ),
            &["source"],
        )?;
        registry.register(Box::new(matches_recorded_total.clone()))?;

        let command_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "arena_elo_command_duration_seconds",
                "Command handling duration",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["kind"],
        )?;
        registry.register(Box::new(command_duration_seconds.clone()))?;

        let competitors = IntGauge::new(
            "arena_elo_competitors",
            "Competitors on the leaderboard",
        )?;
        registry.register(Box::new(competitors.clone()))?;

        let history_length = IntGauge::new(
            "arena_elo_match_history_length",
            "Entries in the match history",
        )?;
        registry.register(Box::new(history_length.clone()))?;

        Ok(Self {
            registry,
            commands_total,
            matches_recorded_total,
            command_duration_seconds,
            competitors,
            history_length,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record a handled command
    pub fn record_command(&self, kind: &str, status: CommandStatus, duration: Duration) {
        let status_str = match status {
            CommandStatus::Success => "success",
            CommandStatus::Error => "error",
        };

        self.commands_total
            .with_label_values(&[kind, status_str])
            .inc();

        self.command_duration_seconds
            .with_label_values(&[kind])
            .observe(duration.as_secs_f64());
    }

    /// Record a successfully stored match
    pub fn record_match(&self, source: MatchSource) {
        let source_str = match source {
            MatchSource::Automated => "automated",
            MatchSource::Manual => "manual",
        };

        self.matches_recorded_total
            .with_label_values(&[source_str])
            .inc();
    }

    /// Update leaderboard size gauges
    pub fn set_totals(&self, competitors: usize, matches: usize) {
        self.competitors.set(competitors as i64);
        self.history_length.set(matches as i64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn export_metrics(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Metrics are not UTF-8: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        collector.set_totals(0, 0);
        assert!(collector.export_metrics().unwrap().contains("arena_elo_competitors 0"));
    }

    #[test]
    fn test_command_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_command("RESET_ALL", CommandStatus::Success, Duration::from_millis(3));
        collector.record_command("RENAME_MODEL", CommandStatus::Error, Duration::from_millis(1));
        collector.record_command("RENAME_MODEL", CommandStatus::Error, Duration::from_millis(1));

        assert_eq!(
            collector
                .commands_total
                .with_label_values(&["RENAME_MODEL", "error"])
                .get(),
            2
        );
        assert_eq!(
            collector
                .command_duration_seconds
                .with_label_values(&["RESET_ALL"])
                .get_sample_count(),
            1
        );
    }

    #[test]
    fn test_match_sources_tracked_separately() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_match(MatchSource::Automated);
        collector.record_match(MatchSource::Automated);
        collector.record_match(MatchSource::Manual);

        let text = collector.export_metrics().unwrap();
        assert!(text.contains("arena_elo_matches_recorded_total{source=\"automated\"} 2"));
        assert!(text.contains("arena_elo_matches_recorded_total{source=\"manual\"} 1"));
    }

    #[test]
    fn test_shared_registry_rejects_duplicates() {
        let registry = Arc::new(Registry::new());
        MetricsCollector::with_registry(registry.clone()).unwrap();
        assert!(MetricsCollector::with_registry(registry).is_err());
    }
}
