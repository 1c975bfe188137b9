//! Sync policy configuration.
//!
//! All widths are in hours. The defaults reproduce the behaviour of a client
//! that syncs roughly a week at a time, but none of the literal values are
//! load-bearing: every heuristic reads them from here.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound for any configured width: one hundred years.
pub const MAX_WINDOW_HOURS: u32 = 100 * 8766;

/// Tunable policy for the sync planner and folder views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Width of the first range fetched for a never-synced folder.
    pub initial_window_hours: u32,
    /// Widths of the successive older ranges fetched while an opening view
    /// is still short of its target count. One fetch per entry at most.
    pub widening_hours: Vec<u32>,
    /// Width of the range fetched by an explicitly permitted grow.
    pub grow_window_hours: u32,
    /// How far past "now" a sync range extends, to absorb clock skew
    /// between client and server.
    pub future_slop_hours: u32,
    /// Account-defined oldest date; history before it is never fetched.
    pub oldest_date_floor: Option<DateTime<Utc>>,
    /// Whether a negative shrink offset `-k` keeps the element at boundary
    /// position `k` (removing `k - 1` items) rather than removing `k`.
    pub negative_offset_inclusive: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_window_hours: 180,
            widening_hours: vec![168, 168, 336, 672],
            grow_window_hours: 168,
            future_slop_hours: 24,
            oldest_date_floor: None,
            negative_offset_inclusive: true,
        }
    }
}

impl SyncConfig {
    /// Parse and validate a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check that every width is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.initial_window_hours == 0 {
            return Err(Error::Config("initial_window_hours must be positive".into()));
        }
        if self.grow_window_hours == 0 {
            return Err(Error::Config("grow_window_hours must be positive".into()));
        }
        if self.widening_hours.contains(&0) {
            return Err(Error::Config("widening_hours entries must be positive".into()));
        }

        let widths = [
            ("initial_window_hours", self.initial_window_hours),
            ("grow_window_hours", self.grow_window_hours),
            ("future_slop_hours", self.future_slop_hours),
        ]
        .into_iter()
        .chain(self.widening_hours.iter().map(|h| ("widening_hours", *h)));
        for (field, hours) in widths {
            if hours > MAX_WINDOW_HOURS {
                return Err(Error::Config(format!(
                    "{field} must be at most {MAX_WINDOW_HOURS} hours, got {hours}"
                )));
            }
        }
        Ok(())
    }

    /// Width of the initial range.
    #[must_use]
    pub fn initial_window(&self) -> Duration {
        Duration::hours(i64::from(self.initial_window_hours))
    }

    /// Width of an explicit grow range.
    #[must_use]
    pub fn grow_window(&self) -> Duration {
        Duration::hours(i64::from(self.grow_window_hours))
    }

    /// Width of the given widening attempt, if the schedule has one.
    #[must_use]
    pub fn widening(&self, attempt: usize) -> Option<Duration> {
        self.widening_hours
            .get(attempt)
            .map(|hours| Duration::hours(i64::from(*hours)))
    }

    /// Margin added past "now" at the newest end of a sync range.
    #[must_use]
    pub fn future_slop(&self) -> Duration {
        Duration::hours(i64::from(self.future_slop_hours))
    }
}
