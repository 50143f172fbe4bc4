//! Document-Store Backend
//!
//! One document per key in an external collection. Entries survive the
//! process and are visible to every client of the same collection, at the
//! cost of a round-trip per operation.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{check_depth, Backend, LoadedFrom};
use crate::clock::Clock;
use crate::docstore::{Document, DocumentCollection};
use crate::error::{CacheError, Result};

/// Backend storing entries as [`Document`]s in a collection.
#[derive(Debug)]
pub struct DocumentBackend<C> {
    collection: C,
    clock: Clock,
    /// Document fetched by the last `read_timestamp`, handed to an immediately
    /// following `read_data_after_timestamp` for the same key
    last_fetched: Option<Document>,
}

impl<C: DocumentCollection> DocumentBackend<C> {
    /// Wraps `collection`, checking the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Store`] when the ping fails.
    pub fn new(collection: C) -> Result<Self> {
        Self::with_clock(collection, Clock::system())
    }

    /// Same as [`DocumentBackend::new`] but stamps writes with `clock`.
    pub fn with_clock(collection: C, clock: Clock) -> Result<Self> {
        let mut backend = Self {
            collection,
            clock,
            last_fetched: None,
        };
        backend.init()?;
        Ok(backend)
    }

    /// The wrapped collection.
    pub fn collection(&self) -> &C {
        &self.collection
    }

    // == Fetch ==
    /// Loads and decodes the document for `key`.
    ///
    /// Documents that do not decode are treated as absent.
    fn fetch(&self, key: &str) -> Result<Document> {
        let raw = self
            .collection
            .find_one(key)?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        match serde_json::from_value::<Document>(raw) {
            Ok(document) => Ok(document),
            Err(e) => {
                warn!(
                    "Ignoring malformed document {:?} in collection {}: {}",
                    key,
                    self.collection.name(),
                    e
                );
                Err(CacheError::NotFound(key.to_string()))
            }
        }
    }
}

impl<C: DocumentCollection> Backend for DocumentBackend<C> {
    fn init(&mut self) -> Result<()> {
        self.collection.ping()?;
        debug!("Connected to collection {}", self.collection.name());
        Ok(())
    }

    fn read_data(&mut self, key: &str) -> Result<Value> {
        self.last_fetched = None;
        Ok(self.fetch(key)?.data)
    }

    fn read_timestamp(&mut self, key: &str) -> Result<(DateTime<Utc>, LoadedFrom)> {
        self.last_fetched = None;
        let document = self.fetch(key)?;
        let timestamp = document.timestamp;
        debug!(
            "Fetched timestamp for {:?} from collection {}",
            key,
            self.collection.name()
        );

        self.last_fetched = Some(document);
        Ok((timestamp, LoadedFrom::Remote))
    }

    fn read_data_after_timestamp(&mut self, key: &str) -> Result<Value> {
        match self.last_fetched.take() {
            Some(document) if document.id == key => Ok(document.data),
            _ => Ok(self.fetch(key)?.data),
        }
    }

    fn write_data(&mut self, key: &str, data: Value) -> Result<()> {
        self.last_fetched = None;
        check_depth(key, &data)?;
        let document = Document {
            id: key.to_string(),
            data,
            timestamp: self.clock.now(),
        };

        self.collection
            .replace_one(key, serde_json::to_value(&document)?)
    }

    fn invalidate(&mut self) -> Result<()> {
        self.last_fetched = None;
        let removed = self.collection.delete_many()?;
        info!(
            "Invalidated collection {} ({} documents removed)",
            self.collection.name(),
            removed
        );
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.collection.count_documents()? as usize)
    }

    fn clock(&self) -> &Clock {
        &self.clock
    }
}
