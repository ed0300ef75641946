//! The match store: single authority over the rating table and match history
//!
//! Every mutation runs as one transaction: read both collections, compute,
//! write both collections in a single batch. Transactions are serialized by
//! an async mutex so concurrent callers never interleave between the read
//! and the write. Backends shared between processes also hold their own
//! exclusive lock for the whole transaction. Readers see either the state before or after a
//! transaction, never a mix, because both keys are written in one batch.

use crate::error::{LeaderboardError, Result};
use crate::leaderboard::{standings, Standing};
use crate::rating::calculator::RatingCalculator;
use crate::rating::elo::EloRatingCalculator;
use crate::storage::{
    leaderboard_keys, KeyValueStore, StorageLock, STORAGE_KEY_ELO, STORAGE_KEY_HISTORY,
};
use crate::store::normalize::{parse_history, parse_rating_table};
use crate::store::snapshot::{build_snapshot, parse_snapshot};
use crate::types::{
    iso_timestamp, ChangeKind, MatchHistory, MatchRecord, Outcome, RatingRecord, RatingTable,
    Snapshot, StateChanged, DRAW_LABEL,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Capacity of the state-changed notification channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Result of a successful import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub competitors: usize,
    pub matches: usize,
}

/// Locks held for the duration of one mutating operation
struct Transaction<'a> {
    _storage: Option<StorageLock>,
    _local: MutexGuard<'a, ()>,
}

/// Persistent leaderboard state with transactional updates
pub struct MatchStore {
    storage: Arc<dyn KeyValueStore>,
    calculator: Arc<dyn RatingCalculator>,
    /// Held across read-compute-write of every mutating operation
    transaction_lock: Mutex<()>,
    events: broadcast::Sender<StateChanged>,
}

impl MatchStore {
    /// Create a match store over the given storage and calculator
    pub fn new(storage: Arc<dyn KeyValueStore>, calculator: Arc<dyn RatingCalculator>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            calculator,
            transaction_lock: Mutex::new(()),
            events,
        }
    }

    /// Create a match store using the standard ELO calculator (K = 32)
    pub fn with_default_calculator(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::new(storage, Arc::new(EloRatingCalculator::default()))
    }

    /// Subscribe to state-changed notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StateChanged> {
        self.events.subscribe()
    }

    /// Record a match outcome and update both competitors.
    ///
    /// Missing competitors start at the calculator's initial score. Both
    /// vote counts increase by one and a match record is appended.
    pub async fn record_match(&self, name_a: &str, name_b: &str, outcome: Outcome) -> Result<MatchRecord> {
        validate_name(name_a, "model A")?;
        validate_name(name_b, "model B")?;
        if name_a == name_b {
            return Err(LeaderboardError::invalid_input(
                "Model names cannot be the same",
            ));
        }

        let start_time = Instant::now();
        let _transaction = self.begin().await?;

        let (mut table, mut history) = self.load().await?;
        let initial = self.calculator.initial_score();

        let old_a = table.get(name_a).copied().unwrap_or_else(|| RatingRecord::new(initial));
        let old_b = table.get(name_b).copied().unwrap_or_else(|| RatingRecord::new(initial));

        let update = self
            .calculator
            .compute_update(old_a.score, old_b.score, outcome);

        table.insert(
            name_a.to_string(),
            RatingRecord {
                score: update.new_rating_a,
                votes: old_a.votes + 1,
            },
        );
        table.insert(
            name_b.to_string(),
            RatingRecord {
                score: update.new_rating_b,
                votes: old_b.votes + 1,
            },
        );

        let winner = match outcome {
            Outcome::AWins => name_a.to_string(),
            Outcome::BWins => name_b.to_string(),
            Outcome::Draw => DRAW_LABEL.to_string(),
        };

        let record = MatchRecord {
            model_a: name_a.to_string(),
            model_b: name_b.to_string(),
            winner: winner.clone(),
            old_rating_a: old_a.score,
            old_rating_b: old_b.score,
            new_rating_a: update.new_rating_a,
            new_rating_b: update.new_rating_b,
            timestamp: iso_timestamp(Utc::now()),
        };
        history.push(record.clone());

        self.persist(&table, &history).await?;

        info!(
            "Match recorded - '{}' ({} -> {}) vs '{}' ({} -> {}), winner: {}, time: {:.2}ms",
            name_a,
            old_a.score,
            update.new_rating_a,
            name_b,
            old_b.score,
            update.new_rating_b,
            winner,
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        self.notify(ChangeKind::MatchRecorded {
            model_a: name_a.to_string(),
            model_b: name_b.to_string(),
            winner,
        });

        Ok(record)
    }

    /// Rename a competitor everywhere it appears.
    ///
    /// Returns the number of match records that were rewritten.
    pub async fn rename_competitor(&self, old_name: &str, new_name: &str) -> Result<usize> {
        validate_name(old_name, "old name")?;
        validate_name(new_name, "new name")?;
        if old_name == new_name {
            return Err(LeaderboardError::invalid_input(
                "New name must differ from the old name",
            ));
        }

        let _transaction = self.begin().await?;
        let (mut table, mut history) = self.load().await?;

        let record = table.get(old_name).copied().ok_or_else(|| LeaderboardError::NotFound {
            name: old_name.to_string(),
        })?;
        if table.contains_key(new_name) {
            return Err(LeaderboardError::Conflict {
                name: new_name.to_string(),
            }
            .into());
        }
        table.remove(old_name);
        table.insert(new_name.to_string(), record);

        let rewritten = rename_in_history(&mut history, old_name, new_name);

        self.persist(&table, &history).await?;

        info!(
            "Model '{}' renamed to '{}' ({} match records updated)",
            old_name, new_name, rewritten
        );

        self.notify(ChangeKind::CompetitorRenamed {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        });

        Ok(rewritten)
    }

    /// Clear the rating table and match history
    pub async fn reset_all(&self) -> Result<()> {
        let _transaction = self.begin().await?;
        self.persist(&RatingTable::new(), &MatchHistory::new()).await?;

        info!("All leaderboard data has been reset");
        self.notify(ChangeKind::Reset);
        Ok(())
    }

    /// Replace both collections with the contents of an import document.
    ///
    /// This overwrites, it does not merge.
    pub async fn import_snapshot(&self, document: &Value) -> Result<ImportSummary> {
        let snapshot = parse_snapshot(document, self.calculator.initial_score())?;
        self.replace_with(snapshot).await
    }

    /// Replace both collections with an already-parsed snapshot
    pub async fn replace_with(&self, snapshot: Snapshot) -> Result<ImportSummary> {
        let summary = ImportSummary {
            competitors: snapshot.elo_data.len(),
            matches: snapshot.match_history.len(),
        };

        let _transaction = self.begin().await?;
        self.persist(&snapshot.elo_data, &snapshot.match_history)
            .await?;

        info!(
            "Imported snapshot - {} models, {} matches",
            summary.competitors, summary.matches
        );
        self.notify(ChangeKind::Imported {
            competitors: summary.competitors,
            matches: summary.matches,
        });
        Ok(summary)
    }

    /// Deep copy of both collections plus export metadata
    pub async fn export_snapshot(&self) -> Result<Snapshot> {
        let (table, history) = self.load().await?;
        debug!(
            "Exporting snapshot - {} models, {} matches",
            table.len(),
            history.len()
        );
        Ok(build_snapshot(table, history, Utc::now()))
    }

    /// Current rating table
    pub async fn ratings(&self) -> Result<RatingTable> {
        Ok(self.load().await?.0)
    }

    /// Current match history, oldest first
    pub async fn history(&self) -> Result<MatchHistory> {
        Ok(self.load().await?.1)
    }

    /// Ranked leaderboard view
    pub async fn standings(&self) -> Result<Vec<Standing>> {
        Ok(standings(&self.ratings().await?))
    }

    /// Serialize against this store's callers, then against any other
    /// process writing the same storage
    async fn begin(&self) -> Result<Transaction<'_>> {
        let local = self.transaction_lock.lock().await;
        let storage = self.storage.lock_exclusive().await?;
        Ok(Transaction {
            _storage: storage,
            _local: local,
        })
    }

    /// Read both collections in one consistent view, normalizing legacy data
    async fn load(&self) -> Result<(RatingTable, MatchHistory)> {
        let values = self.storage.get_many(&leaderboard_keys()).await?;

        let table = match values.get(STORAGE_KEY_ELO) {
            Some(value) => parse_rating_table(value, self.calculator.initial_score())
                .map_err(|reason| LeaderboardError::storage(format!("Stored {}", reason)))?,
            None => RatingTable::new(),
        };
        let history = match values.get(STORAGE_KEY_HISTORY) {
            Some(value) => parse_history(value)
                .map_err(|reason| LeaderboardError::storage(format!("Stored {}", reason)))?,
            None => MatchHistory::new(),
        };

        Ok((table, history))
    }

    /// Write both collections in one batch
    async fn persist(&self, table: &RatingTable, history: &MatchHistory) -> Result<()> {
        let elo_value = serde_json::to_value(table).map_err(|e| {
            LeaderboardError::storage(format!("Failed to serialize rating table: {}", e))
        })?;
        let history_value = serde_json::to_value(history).map_err(|e| {
            LeaderboardError::storage(format!("Failed to serialize match history: {}", e))
        })?;

        self.storage
            .set_many(vec![
                (STORAGE_KEY_ELO.to_string(), elo_value),
                (STORAGE_KEY_HISTORY.to_string(), history_value),
            ])
            .await
    }

    fn notify(&self, change: ChangeKind) {
        let event = StateChanged {
            change,
            timestamp: Utc::now(),
        };
        if self.events.send(event).is_err() {
            debug!("No state-changed listeners subscribed");
        }
    }
}

fn validate_name(name: &str, label: &str) -> Result<()> {
    if name.trim().is_empty() {
        warn!("Rejected empty {}", label);
        return Err(LeaderboardError::invalid_input(format!(
            "Name for {} cannot be empty",
            label
        )));
    }
    Ok(())
}

/// Rewrite every occurrence of `old_name` in the history.
///
/// `winner` is only rewritten in records where the old name actually played,
/// so a competitor literally called "Draw" cannot relabel unrelated draws.
fn rename_in_history(history: &mut MatchHistory, old_name: &str, new_name: &str) -> usize {
    let mut rewritten = 0;
    for record in history.iter_mut() {
        if !record.involves(old_name) {
            continue;
        }
        if record.model_a == old_name {
            record.model_a = new_name.to_string();
        }
        if record.model_b == old_name {
            record.model_b = new_name.to_string();
        }
        if record.winner == old_name {
            record.winner = new_name.to_string();
        }
        rewritten += 1;
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::calculator::{MockRatingCalculator, RatingUpdate};
    use crate::storage::{InMemoryStore, MockKeyValueStore, MockStore};
    use serde_json::json;
    use std::collections::HashMap;

    fn create_test_store() -> MatchStore {
        MatchStore::with_default_calculator(Arc::new(InMemoryStore::new()))
    }

    fn kind_of(err: &anyhow::Error) -> &'static str {
        LeaderboardError::classify(err).kind()
    }

    #[tokio::test]
    async fn test_first_match_initializes_and_counts_votes() {
        let store = create_test_store();
        let record = store.record_match("X", "Y", Outcome::AWins).await.unwrap();

        assert_eq!(record.winner, "X");
        assert_eq!((record.old_rating_a, record.old_rating_b), (1000, 1000));
        assert_eq!((record.new_rating_a, record.new_rating_b), (1016, 984));

        let ratings = store.ratings().await.unwrap();
        assert_eq!(ratings["X"], RatingRecord { score: 1016, votes: 1 });
        assert_eq!(ratings["Y"], RatingRecord { score: 984, votes: 1 });
        assert_eq!(store.history().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_three_match_regression_fixture() {
        let store = create_test_store();
        store.record_match("X", "Y", Outcome::AWins).await.unwrap();
        store.record_match("Y", "Z", Outcome::BWins).await.unwrap();
        let last = store.record_match("X", "Z", Outcome::Draw).await.unwrap();

        let ratings = store.ratings().await.unwrap();
        assert_eq!(ratings["X"], RatingRecord { score: 1016, votes: 2 });
        assert_eq!(ratings["Y"], RatingRecord { score: 969, votes: 2 });
        assert_eq!(ratings["Z"], RatingRecord { score: 1015, votes: 2 });

        assert_eq!(last.winner, "Draw");
        assert_eq!(store.history().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_winner_label_for_b() {
        let store = create_test_store();
        let record = store.record_match("p", "q", Outcome::BWins).await.unwrap();
        assert_eq!(record.winner, "q");
    }

    #[tokio::test]
    async fn test_invalid_names_rejected_without_writes() {
        let storage = Arc::new(MockStore::new());
        let store = MatchStore::with_default_calculator(storage.clone());

        for (a, b) in [("", "Y"), ("X", "  "), ("same", "same")] {
            let err = store.record_match(a, b, Outcome::Draw).await.unwrap_err();
            assert_eq!(kind_of(&err), "invalid_input");
        }
        assert!(storage.get_write_calls().is_empty());
    }

    #[tokio::test]
    async fn test_names_are_case_sensitive() {
        let store = create_test_store();
        store.record_match("Model", "model", Outcome::AWins).await.unwrap();
        assert_eq!(store.ratings().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_calculator_receives_current_scores() {
        let calculator = Arc::new(MockRatingCalculator::new());
        calculator.set_fixed_result(RatingUpdate {
            new_rating_a: 1200,
            new_rating_b: 800,
        });
        let store = MatchStore::new(Arc::new(InMemoryStore::new()), calculator.clone());

        store.record_match("a", "b", Outcome::AWins).await.unwrap();
        store.record_match("b", "a", Outcome::Draw).await.unwrap();

        assert_eq!(
            calculator.get_calculation_calls(),
            vec![(1000, 1000, Outcome::AWins), (800, 1200, Outcome::Draw)]
        );
    }

    #[tokio::test]
    async fn test_rename_moves_record_and_rewrites_history() {
        let store = create_test_store();
        store.record_match("Foo", "Other", Outcome::AWins).await.unwrap();
        store.record_match("Third", "Other", Outcome::Draw).await.unwrap();
        let before = store.ratings().await.unwrap()["Foo"];

        let rewritten = store.rename_competitor("Foo", "Bar").await.unwrap();
        assert_eq!(rewritten, 1);

        let ratings = store.ratings().await.unwrap();
        assert!(!ratings.contains_key("Foo"));
        assert_eq!(ratings["Bar"], before);

        let history = store.history().await.unwrap();
        assert_eq!(history[0].model_a, "Bar");
        assert_eq!(history[0].winner, "Bar");
        assert_eq!(history[1].model_a, "Third");
        assert_eq!(history[1].winner, "Draw");
    }

    #[tokio::test]
    async fn test_rename_conflict_leaves_state_untouched() {
        let storage = Arc::new(MockStore::new());
        let store = MatchStore::with_default_calculator(storage.clone());
        store.record_match("A", "B", Outcome::AWins).await.unwrap();
        let before = store.export_snapshot().await.unwrap();
        let writes_before = storage.get_write_calls().len();

        let err = store.rename_competitor("A", "B").await.unwrap_err();
        assert_eq!(kind_of(&err), "conflict");

        let after = store.export_snapshot().await.unwrap();
        assert_eq!(before.elo_data, after.elo_data);
        assert_eq!(before.match_history, after.match_history);
        assert_eq!(storage.get_write_calls().len(), writes_before);
    }

    #[tokio::test]
    async fn test_rename_missing_and_invalid() {
        let store = create_test_store();
        let err = store.rename_competitor("ghost", "new").await.unwrap_err();
        assert_eq!(kind_of(&err), "not_found");

        let err = store.rename_competitor("same", "same").await.unwrap_err();
        assert_eq!(kind_of(&err), "invalid_input");

        let err = store.rename_competitor("", "x").await.unwrap_err();
        assert_eq!(kind_of(&err), "invalid_input");
    }

    #[tokio::test]
    async fn test_rename_model_called_draw_keeps_other_draws() {
        let store = create_test_store();
        store.record_match("Draw", "x", Outcome::AWins).await.unwrap();
        store.record_match("y", "z", Outcome::Draw).await.unwrap();

        store.rename_competitor("Draw", "Renamed").await.unwrap();
        let history = store.history().await.unwrap();
        assert_eq!(history[0].winner, "Renamed");
        assert_eq!(history[1].winner, "Draw");
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let store = create_test_store();
        store.record_match("X", "Y", Outcome::AWins).await.unwrap();
        store.reset_all().await.unwrap();

        assert!(store.ratings().await.unwrap().is_empty());
        assert!(store.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let store = create_test_store();
        store.record_match("X", "Y", Outcome::AWins).await.unwrap();
        store.record_match("Y", "Z", Outcome::Draw).await.unwrap();
        let exported = store.export_snapshot().await.unwrap();
        assert_eq!(exported.version, 1);

        let other = create_test_store();
        other.record_match("junk", "data", Outcome::BWins).await.unwrap();
        let document = serde_json::to_value(&exported).unwrap();
        let summary = other.import_snapshot(&document).await.unwrap();

        assert_eq!(summary, ImportSummary { competitors: 3, matches: 2 });
        let reimported = other.export_snapshot().await.unwrap();
        assert_eq!(reimported.elo_data, exported.elo_data);
        assert_eq!(reimported.match_history, exported.match_history);
    }

    #[tokio::test]
    async fn test_import_rejects_bad_schema_and_keeps_state() {
        let store = create_test_store();
        store.record_match("X", "Y", Outcome::AWins).await.unwrap();

        let err = store
            .import_snapshot(&json!({"eloData": {}}))
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), "invalid_format");
        assert_eq!(store.ratings().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_legacy_bare_numbers_normalized_on_read() {
        let mut seed = HashMap::new();
        seed.insert("eloData".to_string(), json!({"legacy": 1100}));
        let store = MatchStore::with_default_calculator(Arc::new(MockStore::with_entries(seed)));

        assert_eq!(
            store.ratings().await.unwrap()["legacy"],
            RatingRecord { score: 1100, votes: 0 }
        );

        store.record_match("legacy", "fresh", Outcome::Draw).await.unwrap();
        let ratings = store.ratings().await.unwrap();
        assert_eq!(ratings["legacy"].votes, 1);
        assert!(ratings["legacy"].score < 1100);
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let storage = Arc::new(MockStore::new());
        let store = MatchStore::with_default_calculator(storage.clone());

        storage.set_fail_writes(true);
        let err = store.record_match("X", "Y", Outcome::AWins).await.unwrap_err();
        assert_eq!(kind_of(&err), "storage_failure");

        storage.set_fail_writes(false);
        assert!(store.ratings().await.unwrap().is_empty());

        storage.set_fail_reads(true);
        store.reset_all().await.unwrap();
        let err = store.export_snapshot().await.unwrap_err();
        assert_eq!(kind_of(&err), "storage_failure");
    }

    #[tokio::test]
    async fn test_corrupt_stored_collection_is_storage_failure() {
        let mut seed = HashMap::new();
        seed.insert("matchHistory".to_string(), json!("not a list"));
        let store = MatchStore::with_default_calculator(Arc::new(MockStore::with_entries(seed)));

        let err = store.history().await.unwrap_err();
        assert_eq!(kind_of(&err), "storage_failure");
    }

    #[tokio::test]
    async fn test_malformed_rating_entries_do_not_block_writes() {
        let mut seed = HashMap::new();
        seed.insert(
            "eloData".to_string(),
            json!({"old": null, "odd": {"score": "1200"}}),
        );
        let store = MatchStore::with_default_calculator(Arc::new(MockStore::with_entries(seed)));

        let record = store.record_match("old", "odd", Outcome::AWins).await.unwrap();
        assert_eq!((record.old_rating_a, record.old_rating_b), (1000, 1000));

        let ratings = store.ratings().await.unwrap();
        assert_eq!(ratings["old"], RatingRecord { score: 1016, votes: 1 });
        assert_eq!(ratings["odd"], RatingRecord { score: 984, votes: 1 });
    }

    #[tokio::test]
    async fn test_import_accepts_malformed_rating_entries() {
        let store = create_test_store();
        let summary = store
            .import_snapshot(&json!({"eloData": {"m": null}, "matchHistory": []}))
            .await
            .unwrap();
        assert_eq!(summary.competitors, 1);
        assert_eq!(store.ratings().await.unwrap()["m"], RatingRecord::new(1000));
    }

    #[tokio::test]
    async fn test_record_writes_both_keys_in_one_batch() {
        let mut storage = MockKeyValueStore::new();
        storage
            .expect_lock_exclusive()
            .times(1)
            .returning(|| Ok(None));
        storage
            .expect_get_many()
            .times(1)
            .returning(|_| Ok(HashMap::new()));
        storage
            .expect_set_many()
            .times(1)
            .withf(|entries: &Vec<(String, Value)>| {
                entries.len() == 2 && entries[0].0 == "eloData" && entries[1].0 == "matchHistory"
            })
            .returning(|_| Ok(()));

        let store = MatchStore::with_default_calculator(Arc::new(storage));
        store.record_match("X", "Y", Outcome::AWins).await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_not_found_never_writes() {
        let mut storage = MockKeyValueStore::new();
        storage.expect_lock_exclusive().returning(|| Ok(None));
        storage
            .expect_get_many()
            .returning(|_| Ok(HashMap::new()));
        storage.expect_set_many().never();

        let store = MatchStore::with_default_calculator(Arc::new(storage));
        assert!(store.rename_competitor("a", "b").await.is_err());
    }

    #[tokio::test]
    async fn test_storage_lock_failure_aborts_before_reading() {
        let mut storage = MockKeyValueStore::new();
        storage
            .expect_lock_exclusive()
            .returning(|| Err(LeaderboardError::storage("lock file unavailable")));
        storage.expect_get_many().never();
        storage.expect_set_many().never();

        let store = MatchStore::with_default_calculator(Arc::new(storage));
        let err = store.record_match("X", "Y", Outcome::AWins).await.unwrap_err();
        assert_eq!(kind_of(&err), "storage_failure");
    }

    #[tokio::test]
    async fn test_state_changed_notifications() {
        let store = create_test_store();
        let mut events = store.subscribe();

        store.record_match("X", "Y", Outcome::AWins).await.unwrap();
        store.rename_competitor("X", "X2").await.unwrap();
        store.reset_all().await.unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first.change, ChangeKind::MatchRecorded { ref winner, .. } if winner == "X"));
        let second = events.recv().await.unwrap();
        assert_eq!(
            second.change,
            ChangeKind::CompetitorRenamed {
                old_name: "X".to_string(),
                new_name: "X2".to_string()
            }
        );
        assert_eq!(events.recv().await.unwrap().change, ChangeKind::Reset);
    }

    #[tokio::test]
    async fn test_failed_operation_does_not_notify() {
        let store = create_test_store();
        let mut events = store.subscribe();
        let _ = store.rename_competitor("nobody", "someone").await;
        assert!(events.try_recv().is_err());
    }
}
