//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default max age in seconds
pub const DEFAULT_MAX_AGE_SECS: u64 = 300;

/// Default directory for the file backend
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Storage medium selected by configuration.
///
/// The document-store backend needs a client handle and is never built from
/// configuration; construct it with `Cache::document_store`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Process memory, lost on exit
    Memory,
    /// `cache.json` inside `dir_path`
    File { dir_path: PathBuf },
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Age after which an entry is refreshed through the read function
    pub max_age: Duration,
    /// Backend to store entries in
    pub backend: BackendKind,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_AGE` - Max age in seconds (default: 300)
    /// - `CACHE_BACKEND` - `memory` or `file` (default: memory)
    /// - `CACHE_DIR` - Directory holding `cache.json` for the file backend (default: .cache)
    pub fn from_env() -> Self {
        let max_age_secs = env::var("CACHE_MAX_AGE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_AGE_SECS);

        let dir_path = env::var("CACHE_DIR")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));

        let backend = match env::var("CACHE_BACKEND")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            Ok("file") => BackendKind::File { dir_path },
            _ => BackendKind::Memory,
        };

        Self {
            max_age: Duration::from_secs(max_age_secs),
            backend,
        }
    }

    /// In-memory configuration with the given max age.
    pub fn memory(max_age: Duration) -> Self {
        Self {
            max_age,
            backend: BackendKind::Memory,
        }
    }

    /// File configuration with the given directory and max age.
    pub fn file(dir_path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            max_age,
            backend: BackendKind::File {
                dir_path: dir_path.into(),
            },
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::memory(Duration::from_secs(DEFAULT_MAX_AGE_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_age, Duration::from_secs(300));
        assert_eq!(config.backend, BackendKind::Memory);
    }

    #[test]
    fn test_config_file_constructor() {
        let config = CacheConfig::file("/tmp/quotes", Duration::from_secs(3));
        assert_eq!(config.max_age, Duration::from_secs(3));
        assert_eq!(
            config.backend,
            BackendKind::File {
                dir_path: PathBuf::from("/tmp/quotes")
            }
        );
    }

    // Env vars are process-wide, so every env scenario runs in this one test.
    #[test]
    fn test_config_from_env() {
        env::remove_var("CACHE_MAX_AGE");
        env::remove_var("CACHE_BACKEND");
        env::remove_var("CACHE_DIR");

        let config = CacheConfig::from_env();
        assert_eq!(config.max_age, Duration::from_secs(300));
        assert_eq!(config.backend, BackendKind::Memory);

        env::set_var("CACHE_MAX_AGE", "42");
        env::set_var("CACHE_BACKEND", "FILE");
        env::set_var("CACHE_DIR", "/var/cache/app");

        let config = CacheConfig::from_env();
        assert_eq!(config.max_age, Duration::from_secs(42));
        assert_eq!(
            config.backend,
            BackendKind::File {
                dir_path: PathBuf::from("/var/cache/app")
            }
        );

        env::set_var("CACHE_MAX_AGE", "soon");
        env::set_var("CACHE_BACKEND", "file");
        env::remove_var("CACHE_DIR");

        let config = CacheConfig::from_env();
        assert_eq!(config.max_age, Duration::from_secs(300));
        assert_eq!(
            config.backend,
            BackendKind::File {
                dir_path: PathBuf::from(".cache")
            }
        );

        env::remove_var("CACHE_MAX_AGE");
        env::remove_var("CACHE_BACKEND");
    }
}
