//! Tracking of fully synchronized date ranges.
//!
//! Inside a covered range the index is complete: a message missing there
//! was never on the server or has been deleted. Outside coverage, absence
//! only means "never checked".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::DateRange;

/// Sorted set of disjoint, non-adjacent covered ranges for one folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageTracker {
    intervals: Vec<DateRange>,
}

impl CoverageTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tracker from arbitrary ranges, coalescing as needed.
    #[must_use]
    pub fn from_intervals(intervals: impl IntoIterator<Item = DateRange>) -> Self {
        let mut tracker = Self::new();
        for range in intervals {
            tracker.extend(range);
        }
        tracker
    }

    /// Covered ranges, oldest first.
    #[must_use]
    pub fn intervals(&self) -> &[DateRange] {
        &self.intervals
    }

    /// Whether nothing has been covered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Unions a newly confirmed range into the set.
    pub fn extend(&mut self, range: DateRange) {
        let first = self.intervals.partition_point(|r| r.end() < range.start());
        let last = self.intervals.partition_point(|r| r.start() <= range.end());

        let merged = self.intervals[first..last]
            .iter()
            .fold(range, |acc, r| acc.hull(r));
        self.intervals.splice(first..last, [merged]);
    }

    /// Whether `range` lies entirely inside one covered interval.
    #[must_use]
    pub fn is_covered(&self, range: &DateRange) -> bool {
        self.interval_containing(range.start())
            .is_some_and(|r| r.contains_range(range))
    }

    /// The covered interval containing `date`, if any.
    #[must_use]
    pub fn interval_containing(&self, date: DateTime<Utc>) -> Option<&DateRange> {
        let pos = self.intervals.partition_point(|r| r.end() <= date);
        self.intervals.get(pos).filter(|r| r.contains(date))
    }

    /// Smallest sub-range of `requested` that contains every uncovered
    /// instant of it, or `None` when `requested` is fully covered.
    #[must_use]
    pub fn gap(&self, requested: &DateRange) -> Option<DateRange> {
        let mut start = requested.start();
        let mut end = requested.end();

        // Trim covered prefix.
        if let Some(r) = self.interval_containing(start) {
            start = r.end();
        }
        // Trim covered suffix; the end is exclusive so look at the instant
        // just before it via the interval that reaches it.
        if let Some(r) = self
            .intervals
            .iter()
            .find(|r| r.start() < end && end <= r.end())
        {
            end = r.start();
        }
        DateRange::new(start, end)
    }

    /// Start of the oldest covered interval.
    #[must_use]
    pub fn oldest_start(&self) -> Option<DateTime<Utc>> {
        self.intervals.first().map(DateRange::start)
    }

    /// End of the newest covered interval.
    #[must_use]
    pub fn newest_end(&self) -> Option<DateTime<Utc>> {
        self.intervals.last().map(DateRange::end)
    }

    /// The newest covered interval.
    #[must_use]
    pub fn newest(&self) -> Option<&DateRange> {
        self.intervals.last()
    }

    /// End of the newest covered interval ending at or before `date`.
    #[must_use]
    pub fn covered_end_before(&self, date: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let pos = self.intervals.partition_point(|r| r.end() <= date);
        pos.checked_sub(1).map(|i| self.intervals[i].end())
    }

    /// Start of the oldest covered interval starting at or after `date`.
    #[must_use]
    pub fn covered_start_after(&self, date: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let pos = self.intervals.partition_point(|r| r.start() < date);
        self.intervals.get(pos).map(DateRange::start)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn range(start: i64, end: i64) -> DateRange {
        DateRange::new(at(start), at(end)).unwrap()
    }

    #[test]
    fn test_extend_keeps_disjoint_sorted() {
        let mut cov = CoverageTracker::new();
        cov.extend(range(10, 20));
        cov.extend(range(0, 5));
        cov.extend(range(30, 40));
        assert_eq!(cov.intervals(), &[range(0, 5), range(10, 20), range(30, 40)]);
    }

    #[test]
    fn test_extend_coalesces_overlap_and_adjacency() {
        let mut cov = CoverageTracker::new();
        cov.extend(range(0, 5));
        cov.extend(range(10, 20));
        cov.extend(range(5, 10));
        assert_eq!(cov.intervals(), &[range(0, 20)]);

        cov.extend(range(15, 25));
        assert_eq!(cov.intervals(), &[range(0, 25)]);
    }

    #[test]
    fn test_extend_spanning_many() {
        let mut cov = CoverageTracker::from_intervals([range(0, 1), range(2, 3), range(4, 5)]);
        cov.extend(range(0, 10));
        assert_eq!(cov.intervals(), &[range(0, 10)]);
    }

    #[test]
    fn test_is_covered() {
        let cov = CoverageTracker::from_intervals([range(0, 10), range(20, 30)]);
        assert!(cov.is_covered(&range(2, 8)));
        assert!(cov.is_covered(&range(0, 10)));
        assert!(!cov.is_covered(&range(5, 25)));
        assert!(!cov.is_covered(&range(12, 15)));
    }

    #[test]
    fn test_gap() {
        let cov = CoverageTracker::from_intervals([range(0, 10), range(20, 30)]);
        assert_eq!(cov.gap(&range(5, 25)), Some(range(10, 20)));
        assert_eq!(cov.gap(&range(5, 40)), Some(range(10, 40)));
        assert_eq!(cov.gap(&range(-5, 8)), Some(range(-5, 0)));
        assert_eq!(cov.gap(&range(2, 9)), None);
        assert_eq!(CoverageTracker::new().gap(&range(1, 2)), Some(range(1, 2)));
    }

    #[test]
    fn test_neighbour_lookups() {
        let cov = CoverageTracker::from_intervals([range(0, 10), range(20, 30)]);
        assert_eq!(cov.covered_end_before(at(15)), Some(at(10)));
        assert_eq!(cov.covered_end_before(at(5)), None);
        assert_eq!(cov.covered_start_after(at(15)), Some(at(20)));
        assert_eq!(cov.interval_containing(at(25)), Some(&range(20, 30)));
        assert_eq!(cov.interval_containing(at(10)), None);
    }

    proptest! {
        #[test]
        fn prop_intervals_disjoint_and_monotonic(
            spans in proptest::collection::vec((0i64..200, 1i64..30), 1..20),
        ) {
            let mut cov = CoverageTracker::new();
            for (start, len) in spans {
                let added = range(start, start + len);
                let before = cov.clone();
                cov.extend(added);

                prop_assert!(cov.is_covered(&added));
                for old in before.intervals() {
                    prop_assert!(cov.is_covered(old));
                }
                for pair in cov.intervals().windows(2) {
                    prop_assert!(pair[0].end() < pair[1].start());
                }
            }
        }
    }
}
