//! File Backend
//!
//! Persists the whole cache as one JSON document, `cache.json`, inside a
//! configured directory:
//!
//! ```json
//! {
//!   "quotes/eur": { "data": {"bid": 1.08}, "timestamp": "2024-05-01T12:00:00Z" }
//! }
//! ```
//!
//! The file is loaded once at construction and reads are served from the
//! in-memory copy. Every write rewrites the full file, so write cost grows
//! with the cache size. Commits go through `cache.json.tmp`, which is synced
//! and then renamed over the live file, so readers of the file never see a
//! half-written document.
//!
//! Loading never fails on bad content: unparseable files load as an empty
//! cache, and entries without a `data` field or a valid ISO-8601 `timestamp`
//! are dropped. Both cases log a warning.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::backend::{check_depth, Backend, LoadedFrom};
use crate::cache::CacheEntry;
use crate::clock::Clock;
use crate::error::{CacheError, Result};

/// Name of the cache document inside the backend directory
pub const CACHE_FILE_NAME: &str = "cache.json";

const TEMPFILE_SUFFIX: &str = "tmp";

/// Backend persisting entries to `<dir_path>/cache.json`.
#[derive(Debug)]
pub struct FileBackend {
    dir_path: PathBuf,
    file_path: PathBuf,
    entries: HashMap<String, CacheEntry>,
    clock: Clock,
}

impl FileBackend {
    /// Opens (or creates) the cache file in `dir_path`, on the system clock.
    ///
    /// The directory and its parents are created if missing.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be created or the
    /// first empty file cannot be committed. Corrupted content is not an error.
    pub fn new(dir_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_clock(dir_path, Clock::system())
    }

    /// Same as [`FileBackend::new`] but stamps writes with `clock`.
    pub fn with_clock(dir_path: impl Into<PathBuf>, clock: Clock) -> Result<Self> {
        let dir_path = dir_path.into();
        let file_path = dir_path.join(CACHE_FILE_NAME);

        let mut backend = Self {
            dir_path,
            file_path,
            entries: HashMap::new(),
            clock,
        };
        backend.create_dir_root()?;
        backend.init()?;

        Ok(backend)
    }

    /// Path of the JSON document backing this instance.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Directory holding the cache file.
    pub fn dir_path(&self) -> &Path {
        &self.dir_path
    }

    fn temp_path(&self) -> PathBuf {
        self.dir_path.join(format!("{CACHE_FILE_NAME}.{TEMPFILE_SUFFIX}"))
    }

    fn create_dir_root(&self) -> Result<()> {
        fs::create_dir_all(&self.dir_path)?;

        // A crash mid-commit can leave the temp file behind
        let temp_path = self.temp_path();
        if temp_path.exists() {
            debug!("Removing leftover temp file {}", temp_path.display());
            let _ = fs::remove_file(temp_path);
        }

        Ok(())
    }

    // == Load ==
    /// Reads and validates the cache file.
    ///
    /// Returns `NotFound` when the file does not exist yet.
    fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        let bytes = match fs::read(&self.file_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::NotFound(self.file_path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let document = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(document)) => document,
            Ok(other) => {
                warn!(
                    "Cache file {} holds a JSON {} instead of an object, starting empty",
                    self.file_path.display(),
                    json_kind(&other)
                );
                return Ok(HashMap::new());
            }
            Err(e) => {
                warn!(
                    "Cache file {} is empty or corrupted ({}), starting empty",
                    self.file_path.display(),
                    e
                );
                return Ok(HashMap::new());
            }
        };

        let total = document.len();
        let entries: HashMap<String, CacheEntry> = document
            .into_iter()
            .filter_map(|(key, value)| parse_entry(&key, value).map(|entry| (key, entry)))
            .collect();

        if entries.len() < total {
            warn!(
                "Dropped {} malformed entries from {}",
                total - entries.len(),
                self.file_path.display()
            );
        }
        debug!(
            "Loaded {} entries from {}",
            entries.len(),
            self.file_path.display()
        );

        Ok(entries)
    }

    // == Commit ==
    /// Rewrites the whole file from the in-memory map.
    fn commit(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        let temp_path = self.temp_path();

        let result = (|| -> Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&bytes)?;
            file.sync_data()?;
            fs::rename(&temp_path, &self.file_path)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result?;

        debug!(
            "Committed {} entries to {}",
            self.entries.len(),
            self.file_path.display()
        );
        Ok(())
    }

    fn entry(&self, key: &str) -> Result<&CacheEntry> {
        self.entries
            .get(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }
}

impl Backend for FileBackend {
    fn init(&mut self) -> Result<()> {
        match self.load() {
            Ok(entries) => {
                self.entries = entries;
                Ok(())
            }
            Err(CacheError::NotFound(_)) => {
                info!(
                    "No cache file at {}, creating an empty one",
                    self.file_path.display()
                );
                self.invalidate()
            }
            Err(e) => Err(e),
        }
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
        let previous = self.entries.insert(key.to_string(), entry);

        // Keep memory and disk in step when the commit fails
        if let Err(e) = self.commit() {
            match previous {
                Some(previous) => self.entries.insert(key.to_string(), previous),
                None => self.entries.remove(key),
            };
            return Err(e);
        }

        Ok(())
    }

    fn invalidate(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.entries);

        if let Err(e) = self.commit() {
            self.entries = previous;
            return Err(e);
        }

        info!(
            "Invalidated {} ({} entries removed)",
            self.file_path.display(),
            previous.len()
        );
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn clock(&self) -> &Clock {
        &self.clock
    }
}

// == Entry Validation ==
/// Turns one top-level value of the file into an entry, or drops it.
fn parse_entry(key: &str, value: Value) -> Option<CacheEntry> {
    let Value::Object(mut fields) = value else {
        warn!("Dropping cache entry {:?}: not an object", key);
        return None;
    };

    let Some(data) = fields.remove("data") else {
        warn!("Dropping cache entry {:?}: missing data", key);
        return None;
    };

    let timestamp = match take_timestamp(&mut fields) {
        Some(Ok(timestamp)) => timestamp,
        Some(Err(raw)) => {
            warn!("Dropping cache entry {:?}: invalid timestamp {}", key, raw);
            return None;
        }
        None => {
            warn!("Dropping cache entry {:?}: missing timestamp", key);
            return None;
        }
    };

    Some(CacheEntry::new(data, timestamp))
}

/// Removes and parses the `timestamp` field. `Err` carries the raw value.
fn take_timestamp(
    fields: &mut Map<String, Value>,
) -> Option<std::result::Result<DateTime<Utc>, Value>> {
    let raw = fields.remove("timestamp")?;
    let parsed = raw
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Some(parsed.ok_or(raw))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MAX_DATA_DEPTH;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::tempdir;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_run_creates_dir_and_empty_file() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("nested").join("cache");

        let backend = FileBackend::new(&cache_dir).unwrap();

        assert!(cache_dir.is_dir());
        assert!(backend.is_empty().unwrap());
        let on_disk: Value =
            serde_json::from_slice(&fs::read(cache_dir.join(CACHE_FILE_NAME)).unwrap()).unwrap();
        assert_eq!(on_disk, json!({}));
    }

    #[test]
    fn test_create_dir_on_existing() {
        let dir = tempdir().unwrap();
        FileBackend::new(dir.path()).unwrap();
        FileBackend::new(dir.path()).unwrap();

        assert!(dir.path().join(CACHE_FILE_NAME).is_file());
    }

    #[test]
    fn test_write_rewrites_whole_file() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::with_clock(dir.path(), Clock::manual(noon())).unwrap();

        backend.write_data("a", json!({"x": 1})).unwrap();
        backend.write_data("b", json!([1, 2, 3])).unwrap();

        let on_disk: Value =
            serde_json::from_slice(&fs::read(backend.file_path()).unwrap()).unwrap();
        assert_eq!(
            on_disk,
            json!({
                "a": {"data": {"x": 1}, "timestamp": "2024-05-01T12:00:00Z"},
                "b": {"data": [1, 2, 3], "timestamp": "2024-05-01T12:00:00Z"},
            })
        );
        assert!(!backend.temp_path().exists());
    }

    #[test]
    fn test_reload_from_disk() {
        let dir = tempdir().unwrap();
        {
            let mut backend = FileBackend::with_clock(dir.path(), Clock::manual(noon())).unwrap();
            backend.write_data("k", json!({"nested": {"v": null}})).unwrap();
        }

        let mut reopened = FileBackend::new(dir.path()).unwrap();
        assert_eq!(reopened.read_data("k").unwrap(), json!({"nested": {"v": null}}));
        assert_eq!(
            reopened.read_timestamp("k").unwrap(),
            (noon(), LoadedFrom::LocalMemory)
        );
    }

    #[test]
    fn test_garbage_file_loads_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CACHE_FILE_NAME), b"\x00\xffnot json{{").unwrap();

        let mut backend = FileBackend::new(dir.path()).unwrap();

        assert!(backend.is_empty().unwrap());
        assert!(backend.read_data("k").unwrap_err().is_miss());
    }

    #[test]
    fn test_empty_file_loads_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CACHE_FILE_NAME), b"").unwrap();

        let backend = FileBackend::new(dir.path()).unwrap();
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn test_non_object_document_loads_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CACHE_FILE_NAME), b"[1, 2, 3]").unwrap();

        let backend = FileBackend::new(dir.path()).unwrap();
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn test_malformed_entries_are_pruned() {
        let dir = tempdir().unwrap();
        let document = json!({
            "good": {"data": "ok", "timestamp": "2024-05-01T12:00:00Z"},
            "offset": {"data": 7, "timestamp": "2024-05-01T14:00:00+02:00"},
            "extra_fields": {"data": 1, "timestamp": "2024-05-01T12:00:00Z", "etag": "abc"},
            "no_data": {"timestamp": "2024-05-01T12:00:00Z"},
            "no_timestamp": {"data": 1},
            "bad_timestamp": {"data": 1, "timestamp": "yesterday"},
            "numeric_timestamp": {"data": 1, "timestamp": 1714564800},
            "not_an_entry": 42,
        });
        fs::write(
            dir.path().join(CACHE_FILE_NAME),
            serde_json::to_vec(&document).unwrap(),
        )
        .unwrap();

        let mut backend = FileBackend::new(dir.path()).unwrap();

        assert_eq!(backend.len().unwrap(), 3);
        assert_eq!(backend.read_data("good").unwrap(), json!("ok"));
        assert_eq!(backend.read_timestamp("offset").unwrap().0, noon());
        assert_eq!(backend.read_data("extra_fields").unwrap(), json!(1));
        for pruned in [
            "no_data",
            "no_timestamp",
            "bad_timestamp",
            "numeric_timestamp",
            "not_an_entry",
        ] {
            assert!(backend.read_data(pruned).unwrap_err().is_miss(), "{pruned}");
        }
    }

    #[test]
    fn test_null_data_is_a_valid_entry() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CACHE_FILE_NAME),
            br#"{"k": {"data": null, "timestamp": "2024-05-01T12:00:00Z"}}"#,
        )
        .unwrap();

        let mut backend = FileBackend::new(dir.path()).unwrap();
        assert_eq!(backend.read_data("k").unwrap(), Value::Null);
    }

    #[test]
    fn test_invalidate_commits_empty_file() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path()).unwrap();
        backend.write_data("a", json!(1)).unwrap();

        backend.invalidate().unwrap();
        backend.invalidate().unwrap();

        assert!(backend.is_empty().unwrap());
        let reopened = FileBackend::new(dir.path()).unwrap();
        assert!(reopened.is_empty().unwrap());
    }

    #[test]
    fn test_leftover_temp_file_is_removed() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join(format!("{CACHE_FILE_NAME}.{TEMPFILE_SUFFIX}"));
        fs::write(&temp, b"{\"half\": ").unwrap();

        FileBackend::new(dir.path()).unwrap();

        assert!(!temp.exists());
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path()).unwrap();

        backend.write_data("k", json!("v1")).unwrap();
        backend.write_data("k", json!("v2")).unwrap();

        let mut reopened = FileBackend::new(dir.path()).unwrap();
        assert_eq!(reopened.read_data("k").unwrap(), json!("v2"));
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn test_failed_commit_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path()).unwrap();
        backend.write_data("k", json!("v1")).unwrap();

        // A directory at the temp path makes File::create fail
        fs::create_dir(backend.temp_path()).unwrap();

        assert!(matches!(
            backend.write_data("k", json!("v2")),
            Err(CacheError::Io(_))
        ));
        assert!(backend.write_data("new", json!(0)).is_err());
        assert_eq!(backend.read_data("k").unwrap(), json!("v1"));
        assert!(backend.read_data("new").unwrap_err().is_miss());
    }

    #[test]
    fn test_failed_invalidate_keeps_entries() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path()).unwrap();
        backend.write_data("k", json!("v1")).unwrap();

        fs::create_dir(backend.temp_path()).unwrap();

        assert!(matches!(backend.invalidate(), Err(CacheError::Io(_))));
        assert_eq!(backend.len().unwrap(), 1);
        assert_eq!(backend.read_data("k").unwrap(), json!("v1"));

        // Memory and disk still agree
        fs::remove_dir(backend.temp_path()).unwrap();
        let mut reopened = FileBackend::new(dir.path()).unwrap();
        assert_eq!(reopened.read_data("k").unwrap(), json!("v1"));
    }

    #[test]
    fn test_deep_value_round_trips_up_to_max_depth() {
        let dir = tempdir().unwrap();
        let mut deep = json!("leaf");
        for _ in 0..MAX_DATA_DEPTH {
            deep = json!([deep]);
        }

        let mut backend = FileBackend::new(dir.path()).unwrap();
        backend.write_data("deep", deep.clone()).unwrap();

        let mut reopened = FileBackend::new(dir.path()).unwrap();
        assert_eq!(reopened.read_data("deep").unwrap(), deep);
    }

    #[test]
    fn test_too_deep_value_is_rejected_and_file_stays_loadable() {
        let dir = tempdir().unwrap();
        let mut too_deep = json!(0);
        for _ in 0..200 {
            too_deep = json!([too_deep]);
        }

        let mut backend = FileBackend::new(dir.path()).unwrap();
        backend.write_data("other", json!("keep me")).unwrap();

        assert!(matches!(
            backend.write_data("deep", too_deep),
            Err(CacheError::Serialization(_))
        ));
        assert!(backend.read_data("deep").unwrap_err().is_miss());

        let mut reopened = FileBackend::new(dir.path()).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
        assert_eq!(reopened.read_data("other").unwrap(), json!("keep me"));
    }
}
