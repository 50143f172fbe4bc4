//! Backend Module
//!
//! Storage media the cache façade can sit on. Every backend offers the same
//! read / write / invalidate contract, so the façade's staleness logic does
//! not depend on where entries live.

mod document;
mod file;
mod memory;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::clock::Clock;
use crate::error::{CacheError, Result};

pub use document::DocumentBackend;
pub use file::{FileBackend, CACHE_FILE_NAME};
pub use memory::MemoryBackend;

/// Deepest array/object nesting accepted for cached data.
///
/// Stored entries wrap the data in one or two more levels, and the JSON
/// reader refuses documents nested deeper than 127 levels, so anything past
/// this limit could be written but never loaded back.
pub const MAX_DATA_DEPTH: usize = 100;

// == Loaded From ==
/// Where a timestamp lookup was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadedFrom {
    /// Process-local copy, no I/O
    LocalMemory,
    /// Fetched from an external store
    Remote,
}

// == Backend Trait ==
/// Contract every storage medium satisfies.
///
/// `read_data` and `read_timestamp` report an absent key with
/// [`CacheError::NotFound`](crate::CacheError::NotFound); the façade treats
/// that as a miss and never surfaces it.
pub trait Backend: Send {
    /// Loads existing state or creates an empty store.
    fn init(&mut self) -> Result<()>;

    /// Returns the data cached under `key`.
    fn read_data(&mut self, key: &str) -> Result<Value>;

    /// Returns when `key` was last written and where that answer came from.
    fn read_timestamp(&mut self, key: &str) -> Result<(DateTime<Utc>, LoadedFrom)>;

    /// Returns the data for `key` right after a `read_timestamp` of the same
    /// key. Remote backends may answer from the document that lookup fetched.
    fn read_data_after_timestamp(&mut self, key: &str) -> Result<Value> {
        self.read_data(key)
    }

    /// Stores `data` under `key`, stamped with the backend clock's now.
    fn write_data(&mut self, key: &str, data: Value) -> Result<()>;

    /// Drops every entry of this backend.
    fn invalidate(&mut self) -> Result<()>;

    /// Number of entries currently stored.
    fn len(&self) -> Result<usize>;

    /// Returns true if no entries are stored.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Time source used to stamp writes.
    fn clock(&self) -> &Clock;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn read_data(&mut self, key: &str) -> Result<Value> {
        (**self).read_data(key)
    }

    fn read_timestamp(&mut self, key: &str) -> Result<(DateTime<Utc>, LoadedFrom)> {
        (**self).read_timestamp(key)
    }

    fn read_data_after_timestamp(&mut self, key: &str) -> Result<Value> {
        (**self).read_data_after_timestamp(key)
    }

    fn write_data(&mut self, key: &str, data: Value) -> Result<()> {
        (**self).write_data(key, data)
    }

    fn invalidate(&mut self) -> Result<()> {
        (**self).invalidate()
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }

    fn clock(&self) -> &Clock {
        (**self).clock()
    }
}

// == Depth Check ==
/// Rejects data nested deeper than [`MAX_DATA_DEPTH`].
///
/// # Errors
///
/// Returns [`CacheError::Serialization`] naming the key.
pub fn check_depth(key: &str, data: &Value) -> Result<()> {
    let mut pending = vec![(data, 0usize)];

    while let Some((value, depth)) = pending.pop() {
        let children: Box<dyn Iterator<Item = &Value>> = match value {
            Value::Array(items) => Box::new(items.iter()),
            Value::Object(fields) => Box::new(fields.values()),
            _ => continue,
        };
        let depth = depth + 1;
        if depth > MAX_DATA_DEPTH {
            return Err(CacheError::Serialization(serde::ser::Error::custom(format!(
                "data for {key:?} is nested deeper than {MAX_DATA_DEPTH} levels"
            ))));
        }
        pending.extend(children.map(|child| (child, depth)));
    }

    Ok(())
}
