//! Clock Module
//!
//! Time source used to stamp entries and to judge their age.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

// == Clock ==
/// Source of "now" for a backend and the façade reading through it.
///
/// `System` reads the wall clock. `Manual` holds a shared instant that only
/// moves when told to, which keeps staleness tests deterministic. Clones of a
/// manual clock share the same instant.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Manual(Arc<Mutex<DateTime<Utc>>>),
}

impl Clock {
    /// Wall clock.
    pub fn system() -> Self {
        Clock::System
    }

    /// A clock frozen at `start` until advanced.
    pub fn manual(start: DateTime<Utc>) -> Self {
        Clock::Manual(Arc::new(Mutex::new(start)))
    }

    // == Now ==
    /// Returns the current instant of this clock.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Manual(instant) => *instant.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    // == Advance ==
    /// Moves a manual clock forward. No effect on the system clock.
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(instant) = self {
            let mut guard = instant.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = chrono::Duration::from_std(by)
                .ok()
                .and_then(|step| guard.checked_add_signed(step))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
        }
    }

    /// Pins a manual clock to `to`. No effect on the system clock.
    pub fn set(&self, to: DateTime<Utc>) {
        if let Clock::Manual(instant) = self {
            *instant.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }
}
