//! Mock storage for testing failure paths

use crate::error::{LeaderboardError, Result};
use crate::storage::{InMemoryStore, KeyValueStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory storage that records writes and can be told to fail
#[derive(Debug, Default)]
pub struct MockStore {
    inner: InMemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_calls: AtomicUsize,
    write_calls: Mutex<Vec<Vec<String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw values
    pub fn with_entries(entries: HashMap<String, Value>) -> Self {
        Self {
            inner: InMemoryStore::with_entries(entries),
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Keys written by each successful batch, in order
    pub fn get_write_calls(&self) -> Vec<Vec<String>> {
        self.write_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(LeaderboardError::storage("simulated read failure"));
        }
        self.inner.get_many(keys).await
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LeaderboardError::storage("simulated write failure"));
        }
        let keys = entries.iter().map(|(key, _)| key.clone()).collect();
        self.inner.set_many(entries).await?;
        if let Ok(mut calls) = self.write_calls.lock() {
            calls.push(keys);
        }
        Ok(())
    }
}
