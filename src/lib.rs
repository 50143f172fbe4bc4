//! Mini Cache - A read-through cache with max-age refresh
//!
//! Memoizes an expensive read function per key and transparently refreshes
//! entries once they are older than the configured max age. Entries live in a
//! pluggable backend: process memory, a JSON file, or a document store.

pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod docstore;
pub mod error;
pub mod logging;

pub use backend::{Backend, DocumentBackend, FileBackend, LoadedFrom, MemoryBackend};
pub use cache::{Cache, CacheEntry, CacheStats, EntryState, ReadFn};
pub use clock::Clock;
pub use config::{BackendKind, CacheConfig};
pub use docstore::{Document, DocumentCollection, DocumentStore, MemoryDocumentStore};
pub use error::{CacheError, Result};
pub use logging::init_tracing;
