//! Test fixtures shared by the integration tests
#![allow(dead_code)]

use arena_elo::command::{command_channel, CommandClient, LeaderboardCommandHandler};
use arena_elo::metrics::MetricsCollector;
use arena_elo::storage::{FileStore, InMemoryStore, KeyValueStore};
use arena_elo::store::MatchStore;
use arena_elo::types::MatchHistory;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A running leaderboard: store, bus and a client to talk to it
pub struct TestSystem {
    pub store: Arc<MatchStore>,
    pub client: CommandClient,
    pub metrics: Arc<MetricsCollector>,
}

/// Build a leaderboard over the given storage with the bus already consuming
pub fn create_test_system(storage: Arc<dyn KeyValueStore>) -> TestSystem {
    let store = Arc::new(MatchStore::with_default_calculator(storage));
    let metrics = Arc::new(MetricsCollector::new().expect("metrics collector"));
    let handler = LeaderboardCommandHandler::new(store.clone()).with_metrics(metrics.clone());
    let (bus, client) = command_channel(Arc::new(handler), 16);
    bus.spawn();

    TestSystem {
        store,
        client,
        metrics,
    }
}

pub fn create_memory_system() -> TestSystem {
    create_test_system(Arc::new(InMemoryStore::new()))
}

/// Unique data file path under the system temp directory
pub fn temp_data_file(label: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("arena-elo-test-{}-{}", label, uuid::Uuid::new_v4()))
        .join("leaderboard.json")
}

/// Remove a data file and its directory, ignoring errors
pub fn cleanup(path: &PathBuf) {
    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

pub fn file_storage(path: &PathBuf) -> Arc<dyn KeyValueStore> {
    Arc::new(FileStore::new(path.clone()))
}

/// Check that the history reads like a serial execution: every record's
/// pre-match ratings equal the post-match ratings of the competitors'
/// previous appearance, or the default score on first appearance.
pub fn assert_history_is_serial(history: &MatchHistory, default_score: i64) {
    let mut latest: HashMap<&str, i64> = HashMap::new();
    for (index, record) in history.iter().enumerate() {
        let expected_a = latest.get(record.model_a.as_str()).copied().unwrap_or(default_score);
        let expected_b = latest.get(record.model_b.as_str()).copied().unwrap_or(default_score);
        assert_eq!(
            (record.old_rating_a, record.old_rating_b),
            (expected_a, expected_b),
            "match #{} ({} vs {}) did not see the previous write",
            index,
            record.model_a,
            record.model_b
        );
        latest.insert(record.model_a.as_str(), record.new_rating_a);
        latest.insert(record.model_b.as_str(), record.new_rating_b);
    }
}
