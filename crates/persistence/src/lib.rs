#![deny(warnings)]

//! Persistence layer: a single named record holding the serialized game
//! state, behind a small key/value store trait.

use anyhow::{anyhow, Context};
use sim_core::{EconomyConfig, GameState, PersistedState, ValidationError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Record key the game state is stored under.
pub const DEFAULT_RECORD_KEY: &str = "crypto-miner-pro";

/// Returns the default directory used for local saves.
pub fn default_save_dir() -> PathBuf {
    PathBuf::from("./saves")
}

/// Opaque text records addressed by key.
pub trait RecordStore: Send {
    /// Body stored under `key`, or `None` when no record exists.
    fn read(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Replace the record under `key`.
    fn write(&mut self, key: &str, body: &str) -> anyhow::Result<()>;
}

/// In-process store. Clones share the same records, so a test can keep a
/// handle and inspect what the engine wrote.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, String>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one record.
    pub fn with_record(key: &str, body: &str) -> Self {
        let store = Self::default();
        if let Ok(mut records) = store.records.lock() {
            records.insert(key.to_string(), body.to_string());
        }
        store
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.records.lock().ok()?.get(key).cloned()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl RecordStore for MemoryStore {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(records.get(key).cloned())
    }

    fn write(&mut self, key: &str, body: &str) -> anyhow::Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        records.insert(key.to_string(), body.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One JSON file per record in a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl RecordStore for FileStore {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let body = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(body))
    }

    fn write(&mut self, key: &str, body: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.path_for(key);
        // Write then rename so a crash never leaves a truncated save.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

/// Why a stored record could not be turned back into a game state.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The store itself failed.
    #[error("save could not be read: {0}")]
    Unreadable(String),
    /// The record is not a parseable state.
    #[error("save is corrupt: {0}")]
    Corrupt(String),
    /// The record parsed but breaks a state invariant.
    #[error("save is invalid: {0}")]
    Invalid(#[from] ValidationError),
}

/// Result of reading the saved state at startup.
#[derive(Debug)]
pub enum LoadOutcome {
    /// No record exists.
    Absent,
    /// Record merged over the default state.
    Restored(GameState),
    /// A record exists but could not be used.
    Failed(LoadError),
}

/// Saves and loads the game state as one JSON record.
pub struct Gateway {
    store: Box<dyn RecordStore>,
    key: String,
}

impl Gateway {
    pub fn new<S: RecordStore + 'static>(store: S) -> Self {
        Self::with_key(store, DEFAULT_RECORD_KEY)
    }

    pub fn with_key<S: RecordStore + 'static>(store: S, key: &str) -> Self {
        Self {
            store: Box::new(store),
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read and decode the saved state, merging it over the defaults of
    /// `cfg`. Never fails; problems are reported in the outcome.
    pub fn load(&self, cfg: &EconomyConfig) -> LoadOutcome {
        let body = match self.store.read(&self.key) {
            Ok(Some(body)) => body,
            Ok(None) => return LoadOutcome::Absent,
            Err(e) => return LoadOutcome::Failed(LoadError::Unreadable(format!("{e:#}"))),
        };
        let persisted: PersistedState = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(e) => return LoadOutcome::Failed(LoadError::Corrupt(e.to_string())),
        };
        match GameState::restore(cfg, persisted) {
            Ok(state) => {
                info!(key = %self.key, balance = %state.balance, "save restored");
                LoadOutcome::Restored(state)
            }
            Err(e) => LoadOutcome::Failed(LoadError::Invalid(e)),
        }
    }

    /// Serialize and write the state.
    pub fn save(&mut self, state: &GameState) -> anyhow::Result<()> {
        let body = serde_json::to_string(state).context("failed to serialize game state")?;
        self.store.write(&self.key, &body)?;
        debug!(key = %self.key, bytes = body.len(), "state saved");
        Ok(())
    }

    /// Save, logging instead of returning a failure.
    pub fn save_or_warn(&mut self, state: &GameState) -> bool {
        match self.save(state) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %self.key, error = %format!("{e:#}"), "save failed");
                false
            }
        }
    }
}
