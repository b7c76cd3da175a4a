//! Durable storage for reconciliation state.
//!
//! One JSON file per key lives in the store's working directory, named
//! `<key>.state.json`. Writes go through a temp file in the same directory
//! followed by a rename, so a crash mid-write leaves the previous state.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use time::OffsetDateTime;

use crate::state::{Policy, Reconciliation, ReconciliationState, TrackedRecord, reconcile};
use crate::{FeedgenError, Result};

/// Handle on a working directory of state files.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Opens `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if dir.exists() && !dir.is_dir() {
            return Err(FeedgenError::StateError { path: dir, message: "not a directory".to_string() });
        }
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file backing `key`.
    ///
    /// # Errors
    ///
    /// Keys must be non-empty and may not contain path separators or `..`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
            return Err(FeedgenError::ConfigError(format!("Invalid state key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.state.json", key)))
    }

    /// Loads the value stored under `key`.
    ///
    /// A missing file yields `T::default()`.
    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let path = self.path_for(key)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no stored state, starting empty");
                return Ok(T::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| FeedgenError::StateError { path, message: e.to_string() })
    }

    /// Replaces the value stored under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.path_for(key)?;
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| FeedgenError::StateError { path: path.clone(), message: e.to_string() })?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&path).map_err(|e| FeedgenError::Io(e.error))?;

        tracing::info!(path = %path.display(), "saved state");
        Ok(())
    }

    /// Loads reconciliation state and repairs its recency list.
    pub fn load_state<R: TrackedRecord>(&self, key: &str) -> Result<ReconciliationState<R>> {
        let mut state: ReconciliationState<R> = self.load(key)?;
        state.repair(None);
        Ok(state)
    }

    /// Persists `result` only when it discovered something. Returns whether
    /// a write happened.
    pub fn commit<R: TrackedRecord>(&self, key: &str, result: &Reconciliation<R>) -> Result<bool> {
        if !result.changed {
            return Ok(false);
        }
        self.save(key, &result.state)?;
        Ok(true)
    }

    /// Load, reconcile and commit in one step.
    pub fn reconcile<R, I>(&self, key: &str, batch: I, policy: Policy, now: OffsetDateTime) -> Result<Reconciliation<R>>
    where
        R: TrackedRecord,
        I: IntoIterator<Item = R>,
    {
        let state = self.load_state(key)?;
        let result = reconcile(batch, state, policy, now);
        self.commit(key, &result)?;
        Ok(result)
    }
}
