//! Cache Module
//!
//! The read-through façade applications construct, and the entry and
//! statistics types it works with.

mod entry;
mod read_through;
mod stats;


// Re-export public types
pub use entry::{age_since, is_stale, CacheEntry};
pub use read_through::{Cache, EntryState, ReadFn};
pub use stats::CacheStats;
