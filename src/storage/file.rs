//! JSON file storage, durable across restarts
//!
//! All keys live in one JSON object on disk. Each write goes to its own
//! uniquely named temporary file in the same directory, which is then
//! persisted over the original, so a batch either lands whole or not at all
//! and readers never see a partial document.
//!
//! The CLI and a running `serve` process may share one data file. Their
//! transactions are kept apart by an advisory lock on `<file>.lock`.

use crate::error::{LeaderboardError, Result};
use crate::storage::{KeyValueStore, StorageLock};
use async_trait::async_trait;
use fs2::FileExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File-backed key-value storage
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advisory lock file next to the data file
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Directory holding the data file; `.` for a bare file name
    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    async fn read_document(&self) -> Result<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Storage file {} does not exist yet", self.path.display());
                return Ok(Map::new());
            }
            Err(e) => {
                return Err(LeaderboardError::storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(LeaderboardError::storage(format!(
                "Storage file {} does not contain a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(LeaderboardError::storage(format!(
                "Storage file {} is corrupt: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|e| {
            LeaderboardError::storage(format!("Failed to serialize storage document: {}", e))
        })?;

        let directory = self.directory();
        let path = self.path.clone();
        let length = bytes.len();

        tokio::task::spawn_blocking(move || write_atomically(&directory, &path, &bytes))
            .await
            .map_err(|e| LeaderboardError::storage(format!("Storage write task failed: {}", e)))??;

        debug!("Wrote {} bytes to {}", length, self.path.display());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let _guard = self.io_lock.lock().await;
        let document = self.read_document().await?;

        Ok(keys
            .iter()
            .filter_map(|key| document.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let _guard = self.io_lock.lock().await;
        let mut document = self.read_document().await?;

        for (key, value) in entries {
            document.insert(key, value);
        }

        self.write_document(&document).await
    }

    async fn lock_exclusive(&self) -> Result<Option<StorageLock>> {
        let directory = self.directory();
        let lock_path = self.lock_path();

        let lock = tokio::task::spawn_blocking(move || FileLock::acquire(&directory, &lock_path))
            .await
            .map_err(|e| LeaderboardError::storage(format!("Storage lock task failed: {}", e)))??;

        Ok(Some(StorageLock::new(lock)))
    }
}

/// Exclusive advisory lock, released when dropped
#[derive(Debug)]
struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock file is held exclusively
    fn acquire(directory: &Path, path: &Path) -> Result<Self> {
        std::fs::create_dir_all(directory).map_err(|e| {
            LeaderboardError::storage(format!(
                "Failed to create directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                LeaderboardError::storage(format!("Failed to open {}: {}", path.display(), e))
            })?;
        file.lock_exclusive().map_err(|e| {
            LeaderboardError::storage(format!("Failed to lock {}: {}", path.display(), e))
        })?;

        debug!("Acquired storage lock {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release storage lock {}: {}", self.path.display(), e);
        }
    }
}

/// Write `bytes` to a fresh temporary file in `directory`, then move it over `path`
fn write_atomically(directory: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(directory).map_err(|e| {
        LeaderboardError::storage(format!(
            "Failed to create directory {}: {}",
            directory.display(),
            e
        ))
    })?;

    let mut temp = NamedTempFile::new_in(directory).map_err(|e| {
        LeaderboardError::storage(format!(
            "Failed to create a temporary file in {}: {}",
            directory.display(),
            e
        ))
    })?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| {
            LeaderboardError::storage(format!(
                "Failed to write {}: {}",
                temp.path().display(),
                e
            ))
        })?;

    // A failed persist drops the temporary file, which removes it
    temp.persist(path).map_err(|e| {
        warn!("Failed to move {} into place: {}", e.file.path().display(), e.error);
        LeaderboardError::storage(format!("Failed to replace {}: {}", path.display(), e.error))
    })?;
    Ok(())
}
