//! Logging Module
//!
//! Installs the tracing subscriber used by applications embedding the cache.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "mini_cache=info";

/// Initializes a global tracing subscriber with an env filter.
///
/// Defaults to `mini_cache=info`, can be overridden with the `RUST_LOG` env
/// var. Returns false when a global subscriber was already installed, so it
/// is safe to call more than once.
pub fn init_tracing() -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
