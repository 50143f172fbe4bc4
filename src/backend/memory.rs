//! In-Memory Backend
//!
//! Process-local map of entries. Nothing is persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::backend::{check_depth, Backend, LoadedFrom};
use crate::cache::CacheEntry;
use crate::clock::Clock;
use crate::error::{CacheError, Result};

/// Backend holding entries in a `HashMap` owned by this instance.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, CacheEntry>,
    clock: Clock,
}

impl MemoryBackend {
    /// Creates an empty backend on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Clock::system())
    }

    /// Creates an empty backend stamping writes with `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
        }
    }

    fn entry(&self, key: &str) -> Result<&CacheEntry> {
        self.entries
            .get(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }
}

impl Backend for MemoryBackend {
    fn init(&mut self) -> Result<()> {
        self.entries = HashMap::new();
        Ok(())
    }

    fn read_data(&mut self, key: &str) -> Result<Value> {
        Ok(self.entry(key)?.data.clone())
    }

    fn read_timestamp(&mut self, key: &str) -> Result<(DateTime<Utc>, LoadedFrom)> {
        Ok((self.entry(key)?.timestamp, LoadedFrom::LocalMemory))
    }

    fn write_data(&mut self, key: &str, data: Value) -> Result<()> {
        check_depth(key, &data)?;
        let entry = CacheEntry::new(data, self.clock.now());
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn invalidate(&mut self) -> Result<()> {
        let removed = self.entries.len();
        self.entries.clear();
        info!("Invalidated memory backend ({} entries removed)", removed);
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn clock(&self) -> &Clock {
        &self.clock
    }
}
