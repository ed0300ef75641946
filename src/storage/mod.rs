//! Durable key-value storage interface and implementations
//!
//! The match store persists its two collections as JSON values under fixed
//! keys. Backends only need to offer batched reads and batched writes; a
//! batch is applied entirely or not at all. Backends that other processes
//! can write as well also offer an exclusive lock spanning a whole
//! read-modify-write.

pub mod file;
pub mod memory;
pub mod mock;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use mock::MockStore;

/// Storage key holding the rating table
pub const STORAGE_KEY_ELO: &str = "eloData";

/// Storage key holding the match history
pub const STORAGE_KEY_HISTORY: &str = "matchHistory";

/// Exclusive hold on a storage backend, released on drop
pub struct StorageLock {
    _held: Box<dyn Any + Send + Sync>,
}

impl StorageLock {
    pub fn new<T: Any + Send + Sync>(held: T) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl std::fmt::Debug for StorageLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StorageLock")
    }
}

/// Trait for key-value storage operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read several keys in one consistent view. Missing keys are absent from the map.
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>>;

    /// Write several keys atomically
    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()>;

    /// Keep every other writer out, including other processes, until the
    /// returned lock is dropped. Backends private to one process return `None`.
    async fn lock_exclusive(&self) -> Result<Option<StorageLock>> {
        Ok(None)
    }
}

/// Keys used by the leaderboard, in read order
pub fn leaderboard_keys() -> Vec<String> {
    vec![STORAGE_KEY_ELO.to_string(), STORAGE_KEY_HISTORY.to_string()]
}
