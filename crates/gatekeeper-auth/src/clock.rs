//! Injectable time source.
//!
//! Expiry computation must be testable, so every engine takes its notion of
//! "now" from a [`Clock`] rather than calling `OffsetDateTime::now_utc()`
//! directly.

use std::sync::RwLock;

use time::OffsetDateTime;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// System clock backed by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock pinned to a settable instant, for tests.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<OffsetDateTime>,
}

impl FixedClock {
    /// Creates a clock pinned to the given instant.
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Moves the clock to a new instant.
    pub fn set(&self, now: OffsetDateTime) {
        *self.now.write().expect("clock lock poisoned") = now;
    }

    /// Advances the clock by a duration.
    pub fn advance(&self, by: time::Duration) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.read().expect("clock lock poisoned")
    }
}
