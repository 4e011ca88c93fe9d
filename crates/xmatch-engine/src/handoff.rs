//! Shared handoff state between the coordinator and a search context.
//!
//! The coordinator writes one [`HandoffEntry`] per request before the context
//! is opened and clears it once the request resolves. The context only reads.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xmatch_core::{Marketplace, SourceProduct};

use crate::error::EngineError;

/// What the search context needs to know about the request it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffEntry {
    pub source_product_for_match: SourceProduct,
    pub target_marketplace: Marketplace,
    /// Below this combined score the context flags its winner as low
    /// confidence.
    pub min_similarity: f64,
    pub match_in_progress: bool,
    pub updated_at: DateTime<Utc>,
}

impl HandoffEntry {
    #[must_use]
    pub fn in_progress(
        source: SourceProduct,
        target_marketplace: Marketplace,
        min_similarity: f64,
    ) -> Self {
        Self {
            source_product_for_match: source,
            target_marketplace,
            min_similarity,
            match_in_progress: true,
            updated_at: Utc::now(),
        }
    }
}

/// Keyed storage for [`HandoffEntry`] values.
pub trait HandoffStore: Send + Sync {
    /// Writes (or overwrites) the entry for `request_id`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the backing storage cannot be written.
    fn put(&self, request_id: Uuid, entry: &HandoffEntry) -> Result<(), EngineError>;

    /// Reads the entry for `request_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the backing storage cannot be read.
    fn get(&self, request_id: Uuid) -> Result<Option<HandoffEntry>, EngineError>;

    /// Removes the entry for `request_id`. Clearing a missing entry is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the backing storage cannot be written.
    fn clear(&self, request_id: Uuid) -> Result<(), EngineError>;
}

/// Process-local [`HandoffStore`].
#[derive(Debug, Default)]
pub struct MemoryHandoffStore {
    entries: Mutex<BTreeMap<Uuid, HandoffEntry>>,
}

impl MemoryHandoffStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HandoffLock`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, EngineError> {
        Ok(self.entries.lock().map_err(|_| EngineError::HandoffLock)?.len())
    }

    /// # Errors
    ///
    /// Returns [`EngineError::HandoffLock`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.len()? == 0)
    }
}

impl HandoffStore for MemoryHandoffStore {
    fn put(&self, request_id: Uuid, entry: &HandoffEntry) -> Result<(), EngineError> {
        self.entries
            .lock()
            .map_err(|_| EngineError::HandoffLock)?
            .insert(request_id, entry.clone());
        Ok(())
    }

    fn get(&self, request_id: Uuid) -> Result<Option<HandoffEntry>, EngineError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| EngineError::HandoffLock)?
            .get(&request_id)
            .cloned())
    }

    fn clear(&self, request_id: Uuid) -> Result<(), EngineError> {
        self.entries
            .lock()
            .map_err(|_| EngineError::HandoffLock)?
            .remove(&request_id);
        Ok(())
    }
}

/// [`HandoffStore`] persisted as one JSON file per request under a directory.
///
/// Each entry lives at `<dir>/<request_id>.json`, so writers for different
/// requests never touch the same file and separate processes can share the
/// directory. A put writes `<request_id>.json.tmp` and renames it into place.
#[derive(Debug, Clone)]
pub struct JsonFileHandoffStore {
    dir: PathBuf,
}

impl JsonFileHandoffStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, request_id: Uuid) -> PathBuf {
        self.dir.join(format!("{request_id}.json"))
    }

    fn io_error(path: &Path, source: std::io::Error) -> EngineError {
        EngineError::HandoffIo {
            path: path.display().to_string(),
            source,
        }
    }
}

impl HandoffStore for JsonFileHandoffStore {
    fn put(&self, request_id: Uuid, entry: &HandoffEntry) -> Result<(), EngineError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;
        let path = self.entry_path(request_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(entry)?;
        std::fs::write(&tmp, body).map_err(|e| Self::io_error(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Self::io_error(&path, e))
    }

    fn get(&self, request_id: Uuid) -> Result<Option<HandoffEntry>, EngineError> {
        let path = self.entry_path(request_id);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn clear(&self, request_id: Uuid) -> Result<(), EngineError> {
        let path = self.entry_path(request_id);
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(Self::io_error(&path, e)),
            _ => Ok(()),
        }
    }
}

/// Runs `op` against `store` on tokio's blocking pool.
///
/// File-backed stores do synchronous I/O; async callers go through here.
///
/// # Errors
///
/// Returns whatever `op` returns, or [`EngineError::HandoffTask`] if the
/// blocking task panicked.
pub async fn run_blocking<T, F>(store: &Arc<dyn HandoffStore>, op: F) -> Result<T, EngineError>
where
    F: FnOnce(&dyn HandoffStore) -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| EngineError::HandoffTask(e.to_string()))?
}
