//! Document Store Module
//!
//! Client-side view of an external document store: named collections of JSON
//! documents addressed by their `_id`. The cache's document backend is written
//! against these traits, so any store with atomic per-document upserts can
//! back it.

mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use memory::{MemoryCollection, MemoryDocumentStore};

// == Document ==
/// One cache entry as stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Cache key
    #[serde(rename = "_id")]
    pub id: String,
    /// Cached value
    pub data: Value,
    /// When `data` was computed
    pub timestamp: DateTime<Utc>,
}

/// Handle on a store client that hands out collections.
pub trait DocumentStore {
    type Collection: DocumentCollection;

    /// Returns a handle on the collection called `name`.
    fn collection(&self, name: &str) -> Self::Collection;
}

/// Operations the cache needs from one collection.
///
/// Every call may be a network round-trip. Connectivity problems are reported
/// as [`CacheError::Store`](crate::CacheError::Store).
pub trait DocumentCollection: Send {
    /// Collection name.
    fn name(&self) -> &str;

    /// Checks that the store is reachable.
    fn ping(&self) -> Result<()>;

    /// Fetches the raw document with `_id == id`.
    fn find_one(&self, id: &str) -> Result<Option<Value>>;

    /// Inserts or fully replaces the document with `_id == id`.
    fn replace_one(&self, id: &str, document: Value) -> Result<()>;

    /// Removes every document, returning how many were removed.
    fn delete_many(&self) -> Result<u64>;

    /// Number of documents in the collection.
    fn count_documents(&self) -> Result<u64>;
}
