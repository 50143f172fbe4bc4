//! Read-Through Cache
//!
//! Façade tying a backend, a read function and a max age together.
//!
//! Each `read(key)` classifies the key before acting:
//!
//! | State      | Condition                    | Action                          |
//! |------------|------------------------------|---------------------------------|
//! | `NoEntry`  | backend reports a miss       | call read function, write, return |
//! | `Fresh`    | age < max age                | return cached data              |
//! | `Stale`    | age >= max age               | call read function, write, return |
//!
//! A failing read function writes nothing, so the next read retries it.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::backend::{Backend, DocumentBackend, FileBackend, LoadedFrom, MemoryBackend};
use crate::cache::{is_stale, CacheStats};
use crate::config::{BackendKind, CacheConfig};
use crate::docstore::{DocumentCollection, DocumentStore};
use crate::error::{CacheError, Result};

/// Source-of-truth function called on a miss or a stale entry.
pub type ReadFn = Box<dyn FnMut(&str) -> anyhow::Result<Value> + Send>;

// == Entry State ==
/// Where a key stands relative to the max age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    NoEntry,
    Fresh,
    Stale,
}

// == Cache ==
/// Read-through cache over a backend `B`.
pub struct Cache<B = Box<dyn Backend>> {
    backend: B,
    max_age: Duration,
    read_fn: Option<ReadFn>,
    stats: CacheStats,
}

impl<B: fmt::Debug> fmt::Debug for Cache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.backend)
            .field("max_age", &self.max_age)
            .field("has_read_fn", &self.read_fn.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Cache<MemoryBackend> {
    /// Cache held in process memory.
    pub fn memory(max_age: Duration) -> Self {
        Self::new(MemoryBackend::new(), max_age)
    }
}

impl Cache<FileBackend> {
    /// Cache persisted to `<dir_path>/cache.json`.
    ///
    /// # Errors
    ///
    /// Fails only if the directory or the first empty file cannot be created.
    pub fn file(dir_path: impl Into<PathBuf>, max_age: Duration) -> Result<Self> {
        Ok(Self::new(FileBackend::new(dir_path)?, max_age))
    }
}

impl<C: DocumentCollection> Cache<DocumentBackend<C>> {
    /// Cache stored in the `collection` of a document store.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Store`] when the store cannot be reached.
    pub fn document_store<S>(store: &S, collection: &str, max_age: Duration) -> Result<Self>
    where
        S: DocumentStore<Collection = C>,
    {
        Ok(Self::new(
            DocumentBackend::new(store.collection(collection))?,
            max_age,
        ))
    }
}

impl Cache<Box<dyn Backend>> {
    /// Builds the backend named by `config`.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend: Box<dyn Backend> = match &config.backend {
            BackendKind::Memory => Box::new(MemoryBackend::new()),
            BackendKind::File { dir_path } => Box::new(FileBackend::new(dir_path.clone())?),
        };
        debug!(
            "Cache built from config: backend={:?}, max_age={:?}",
            config.backend, config.max_age
        );

        Ok(Self::new(backend, config.max_age))
    }
}

impl<B: Backend> Cache<B> {
    // == Constructor ==
    /// Wraps an initialized backend. The read function can be set later.
    pub fn new(backend: B, max_age: Duration) -> Self {
        Self {
            backend,
            max_age,
            read_fn: None,
            stats: CacheStats::new(),
        }
    }

    /// Sets the read function, builder style.
    pub fn with_read_fn<F>(mut self, read_fn: F) -> Self
    where
        F: FnMut(&str) -> anyhow::Result<Value> + Send + 'static,
    {
        self.set_read_fn(read_fn);
        self
    }

    /// Sets or replaces the read function.
    pub fn set_read_fn<F>(&mut self, read_fn: F)
    where
        F: FnMut(&str) -> anyhow::Result<Value> + Send + 'static,
    {
        self.read_fn = Some(Box::new(read_fn));
    }

    // == Read ==
    /// Returns the value for `key`, calling the read function if the cached
    /// entry is missing or at least `max_age` old.
    ///
    /// # Errors
    ///
    /// - [`CacheError::ReadFunction`] carrying the read function's own error;
    ///   nothing is written in that case.
    /// - [`CacheError::MissingReadFunction`] if a load is needed and no read
    ///   function is set.
    /// - Backend errors (I/O, store connectivity). A miss is never an error.
    pub fn read(&mut self, key: &str) -> Result<Value> {
        let now = self.backend.clock().now();

        match self.state_at(key, now)? {
            EntryState::Fresh => match self.backend.read_data_after_timestamp(key) {
                Ok(data) => {
                    self.stats.record_hit();
                    debug!("Cache hit for {:?}", key);
                    return Ok(data);
                }
                // Dropped by another client between the two lookups
                Err(e) if e.is_miss() => {
                    self.stats.record_miss();
                    debug!("Cache entry for {:?} vanished, reloading", key);
                }
                Err(e) => return Err(e),
            },
            EntryState::Stale => {
                self.stats.record_refresh();
                debug!("Cache entry for {:?} is stale, refreshing", key);
            }
            EntryState::NoEntry => {
                self.stats.record_miss();
                debug!("Cache miss for {:?}", key);
            }
        }

        self.load(key)
    }

    // == Write ==
    /// Stores `data` under `key` with a fresh timestamp, without calling the
    /// read function.
    pub fn write(&mut self, key: &str, data: Value) -> Result<()> {
        self.backend.write_data(key, data)?;
        self.stats.record_write();
        debug!("Wrote {:?} manually", key);
        Ok(())
    }

    // == Invalidate ==
    /// Drops every entry. The next read of any key is a miss.
    pub fn invalidate(&mut self) -> Result<()> {
        self.backend.invalidate()
    }

    // == State ==
    /// Classifies `key` against the max age without calling the read function.
    pub fn state(&mut self, key: &str) -> Result<EntryState> {
        let now = self.backend.clock().now();
        self.state_at(key, now)
    }

    fn state_at(&mut self, key: &str, now: DateTime<Utc>) -> Result<EntryState> {
        match self.backend.read_timestamp(key) {
            Ok((timestamp, loaded_from)) => {
                if loaded_from == LoadedFrom::Remote {
                    self.stats.record_remote_lookup();
                }
                if is_stale(timestamp, now, self.max_age) {
                    Ok(EntryState::Stale)
                } else {
                    Ok(EntryState::Fresh)
                }
            }
            Err(e) if e.is_miss() => Ok(EntryState::NoEntry),
            Err(e) => Err(e),
        }
    }

    fn load(&mut self, key: &str) -> Result<Value> {
        let read_fn = self
            .read_fn
            .as_mut()
            .ok_or_else(|| CacheError::MissingReadFunction(key.to_string()))?;

        let data = read_fn(key).map_err(CacheError::ReadFunction)?;
        self.backend.write_data(key, data.clone())?;

        Ok(data)
    }

    // == Accessors ==
    /// Max age shared by every key.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Underlying backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<usize> {
        self.backend.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> Result<bool> {
        self.backend.is_empty()
    }
}
