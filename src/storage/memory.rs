//! In-memory key-value storage

use crate::error::{LeaderboardError, Result};
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage, lost when the process exits
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with raw values (used to seed legacy data)
    pub fn with_entries(entries: HashMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LeaderboardError::storage("Failed to acquire storage read lock"))?;

        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn set_many(&self, batch: Vec<(String, Value)>) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LeaderboardError::storage("Failed to acquire storage write lock"))?;

        for (key, value) in batch {
            entries.insert(key, value);
        }
        Ok(())
    }
}
