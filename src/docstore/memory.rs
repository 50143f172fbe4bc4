//! In-process document store.
//!
//! Stands in for an external store in tests and single-host setups. Clones of
//! a [`MemoryDocumentStore`] share the same collections, the way several
//! clients of one server would. Documents are held as serialized JSON text, so
//! every round-trip crosses an encode/decode boundary like a real wire would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::docstore::{DocumentCollection, DocumentStore};
use crate::error::{CacheError, Result};

type Collections = HashMap<String, HashMap<String, String>>;

#[derive(Debug)]
struct StoreInner {
    collections: RwLock<Collections>,
    available: AtomicBool,
    requests: AtomicU64,
}

/// Shared, in-process document store.
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Creates an empty, reachable store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                collections: RwLock::new(HashMap::new()),
                available: AtomicBool::new(true),
                requests: AtomicU64::new(0),
            }),
        }
    }

    /// Simulates losing (`false`) or regaining (`true`) connectivity.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Number of requests served since creation, across all clones.
    pub fn request_count(&self) -> u64 {
        self.inner.requests.load(Ordering::SeqCst)
    }

    /// Stores `raw` verbatim under `id`, bypassing encoding.
    ///
    /// Lets tests plant documents written by other, possibly broken, clients.
    pub fn insert_raw(&self, collection: &str, id: &str, raw: impl Into<String>) {
        let mut collections = self
            .inner
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), raw.into());
    }
}

impl DocumentStore for MemoryDocumentStore {
    type Collection = MemoryCollection;

    fn collection(&self, name: &str) -> MemoryCollection {
        MemoryCollection {
            name: name.to_string(),
            store: self.clone(),
        }
    }
}

/// Handle on one collection of a [`MemoryDocumentStore`].
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    store: MemoryDocumentStore,
}

impl MemoryCollection {
    // == Request ==
    /// Counts the round-trip and fails when the store is unreachable.
    fn request(&self) -> Result<()> {
        self.store.inner.requests.fetch_add(1, Ordering::SeqCst);
        if self.store.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Store(format!(
                "collection {:?} unreachable: connection refused",
                self.name
            )))
        }
    }

    fn with_read<T>(&self, f: impl FnOnce(Option<&HashMap<String, String>>) -> T) -> T {
        let collections = self
            .store
            .inner
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(collections.get(&self.name))
    }

    fn with_write<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> T {
        let mut collections = self
            .store
            .inner
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(collections.entry(self.name.clone()).or_default())
    }
}

impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn ping(&self) -> Result<()> {
        self.request()
    }

    fn find_one(&self, id: &str) -> Result<Option<Value>> {
        self.request()?;
        let raw = self.with_read(|documents| documents.and_then(|d| d.get(id).cloned()));

        match raw {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(document) => Ok(Some(document)),
                // Unparseable text still comes back, as the raw string
                Err(_) => Ok(Some(Value::String(raw))),
            },
            None => Ok(None),
        }
    }

    fn replace_one(&self, id: &str, document: Value) -> Result<()> {
        self.request()?;
        let raw = serde_json::to_string(&document)?;
        self.with_write(|documents| documents.insert(id.to_string(), raw));
        Ok(())
    }

    fn delete_many(&self) -> Result<u64> {
        self.request()?;
        let removed = self.with_write(|documents| {
            let count = documents.len();
            documents.clear();
            count
        });
        Ok(removed as u64)
    }

    fn count_documents(&self) -> Result<u64> {
        self.request()?;
        Ok(self.with_read(|documents| documents.map_or(0, HashMap::len)) as u64)
    }
}
