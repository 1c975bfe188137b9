//! Wall-clock abstraction for testability.
//!
//! Sync ranges are anchored at "now", so the engine never reads the system
//! time directly. Production code uses [`SystemClock`]; tests use
//! [`MockClock`] to pin and advance time deterministically.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use foldersync_core::clock::{Clock, MockClock};
//!
//! let start = Utc.with_ymd_and_hms(2026, 1, 24, 12, 0, 0).unwrap();
//! let clock = MockClock::at(start);
//! clock.advance(Duration::hours(2));
//! assert_eq!(clock.now(), start + Duration::hours(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

/// Abstraction over wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock that uses real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A mock clock for testing time-dependent code.
///
/// Stores the current time as microseconds since the epoch so it can be
/// shared across tasks without locking.
#[derive(Debug)]
pub struct MockClock {
    micros: AtomicI64,
}

impl MockClock {
    /// Creates a mock clock pinned at the given time.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(now.timestamp_micros()),
        }
    }

    /// Creates a mock clock that can be shared with an engine.
    #[must_use]
    pub fn shared(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self::at(now))
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let delta = duration.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }

    /// Sets the clock to a specific time.
    pub fn set(&self, now: DateTime<Utc>) {
        self.micros.store(now.timestamp_micros(), Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst))
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}
