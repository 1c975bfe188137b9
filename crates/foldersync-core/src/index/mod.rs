//! Per-folder ordered message index.
//!
//! Headers are kept sorted by [`IndexKey`] (newest first). The only way to
//! change the index is [`MessageIndex::merge`], which classifies a fetched
//! batch against what is already known.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::model::{DateRange, IndexKey, MessageHeader, MessageId, SyncResult};

/// Counts produced by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Headers inserted because their identity was unknown.
    pub fully_new: usize,
    /// Known headers whose flags or deleted marker changed.
    pub flags_changed: usize,
    /// Known headers re-delivered without any change.
    pub unchanged: usize,
    /// Known headers removed because a batch covering their date omitted them.
    pub deleted_removed: usize,
    /// Headers skipped because they conflict with an existing record or
    /// repeat an identity already seen in the same batch.
    pub conflicts: usize,
}

impl MergeStats {
    /// Whether the merge left the index exactly as it was.
    #[must_use]
    pub const fn is_zero_delta(&self) -> bool {
        self.fully_new == 0 && self.flags_changed == 0 && self.deleted_removed == 0
    }

    /// Known headers whose state was delivered again, changed or not.
    #[must_use]
    pub const fn refreshed(&self) -> usize {
        self.flags_changed + self.unchanged
    }

    /// Adds another merge's counts to these.
    pub const fn accumulate(&mut self, other: &Self) {
        self.fully_new += other.fully_new;
        self.flags_changed += other.flags_changed;
        self.unchanged += other.unchanged;
        self.deleted_removed += other.deleted_removed;
        self.conflicts += other.conflicts;
    }

    /// Converts to the consumer-facing result for a view of the given size.
    #[must_use]
    pub const fn to_result(&self, total_visible: usize) -> SyncResult {
        SyncResult {
            total_visible,
            fully_new: self.fully_new,
            flags_updated: self.refreshed(),
            deleted_removed: self.deleted_removed,
            conflicts: self.conflicts,
        }
    }
}

/// Ordered, identity-unique store of message headers for one folder.
#[derive(Debug, Clone, Default)]
pub struct MessageIndex {
    headers: Vec<MessageHeader>,
    dates: HashMap<MessageId, DateTime<Utc>>,
}

impl MessageIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds an index from persisted headers.
    ///
    /// The input need not be sorted. Later duplicates of an identity are
    /// dropped.
    #[must_use]
    pub fn from_headers(headers: Vec<MessageHeader>) -> Self {
        let mut dates = HashMap::with_capacity(headers.len());
        let mut unique = Vec::with_capacity(headers.len());
        for header in headers {
            if dates.contains_key(&header.id) {
                warn!(id = %header.id, "Dropping duplicate header in snapshot");
                continue;
            }
            dates.insert(header.id.clone(), header.date);
            unique.push(header);
        }
        unique.sort_by_key(MessageHeader::key);
        Self {
            headers: unique,
            dates,
        }
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// All headers, newest first.
    #[must_use]
    pub fn headers(&self) -> &[MessageHeader] {
        &self.headers
    }

    /// Iterates headers, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &MessageHeader> {
        self.headers.iter()
    }

    /// Header at a position (0 is the newest).
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&MessageHeader> {
        self.headers.get(position)
    }

    /// Whether a message with this identity is known.
    #[must_use]
    pub fn contains(&self, id: &MessageId) -> bool {
        self.dates.contains_key(id)
    }

    /// Looks up a header by identity.
    #[must_use]
    pub fn get_by_id(&self, id: &MessageId) -> Option<&MessageHeader> {
        let date = *self.dates.get(id)?;
        let key = IndexKey {
            date,
            id: id.clone(),
        };
        self.headers
            .binary_search_by(|h| h.key().cmp(&key))
            .ok()
            .map(|pos| &self.headers[pos])
    }

    /// Position of the first header ordered at or after `key`.
    #[must_use]
    pub fn lower_bound(&self, key: &IndexKey) -> usize {
        self.headers.partition_point(|h| h.key() < *key)
    }

    /// Position just past the last header ordered at or before `key`.
    #[must_use]
    pub fn upper_bound(&self, key: &IndexKey) -> usize {
        self.headers.partition_point(|h| h.key() <= *key)
    }

    /// Number of leading headers dated at or after `date`.
    #[must_use]
    pub fn count_since(&self, date: DateTime<Utc>) -> usize {
        self.headers.partition_point(|h| h.date >= date)
    }

    /// Number of headers dated inside `range`.
    #[must_use]
    pub fn count_in(&self, range: &DateRange) -> usize {
        self.count_since(range.start()) - self.count_since(range.end())
    }

    /// Merges a fetched batch.
    ///
    /// When `declared` is given, the batch is the server's complete listing
    /// for that range: any known header dated inside it that the batch omits
    /// is removed.
    ///
    /// The whole plan is computed before anything is mutated.
    pub fn merge(&mut self, batch: &[MessageHeader], declared: Option<&DateRange>) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut seen: HashSet<&MessageId> = HashSet::with_capacity(batch.len());
        let mut inserts: Vec<&MessageHeader> = Vec::new();
        let mut updates: HashMap<&MessageId, &MessageHeader> = HashMap::new();

        for incoming in batch {
            if !seen.insert(&incoming.id) {
                warn!(id = %incoming.id, "Duplicate identity in fetched batch; skipping");
                stats.conflicts += 1;
                continue;
            }
            match self.get_by_id(&incoming.id) {
                None => {
                    inserts.push(incoming);
                    stats.fully_new += 1;
                }
                Some(existing) if !existing.same_message(incoming) => {
                    warn!(
                        id = %incoming.id,
                        known_date = %existing.date,
                        fetched_date = %incoming.date,
                        "Fetched header conflicts with known record; skipping"
                    );
                    stats.conflicts += 1;
                }
                Some(existing) if existing.state_differs(incoming) => {
                    updates.insert(&incoming.id, incoming);
                    stats.flags_changed += 1;
                }
                Some(_) => stats.unchanged += 1,
            }
        }

        let removed: HashSet<MessageId> = declared
            .map(|range| {
                self.headers
                    .iter()
                    .filter(|h| range.contains(h.date) && !seen.contains(&h.id))
                    .map(|h| h.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        stats.deleted_removed = removed.len();

        if stats.is_zero_delta() {
            return stats;
        }

        for header in &mut self.headers {
            if let Some(update) = updates.get(&header.id) {
                header.flags = update.flags.clone();
                header.deleted = update.deleted;
            }
        }
        if !removed.is_empty() {
            self.headers.retain(|h| !removed.contains(&h.id));
            for id in &removed {
                self.dates.remove(id);
            }
        }
        for header in inserts {
            self.dates.insert(header.id.clone(), header.date);
            let pos = self.lower_bound(&header.key());
            self.headers.insert(pos, header.clone());
        }

        stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::model::Flags;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    fn header(id: &str, hours_ago: i64) -> MessageHeader {
        MessageHeader::new(id, base() - Duration::hours(hours_ago)).with_subject(id)
    }

    fn seen(mut h: MessageHeader) -> MessageHeader {
        h.flags.insert(Flags::SEEN);
        h
    }

    #[test]
    fn test_new_headers_are_sorted_newest_first() {
        let mut index = MessageIndex::new();
        let stats = index.merge(&[header("old", 48), header("new", 1), header("mid", 24)], None);
        assert_eq!(stats.fully_new, 3);

        let ids: Vec<_> = index.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["new", "mid", "old"]);
    }

    #[test]
    fn test_identical_batch_is_zero_delta() {
        let batch = vec![header("a", 1), header("b", 2)];
        let mut index = MessageIndex::new();
        index.merge(&batch, None);

        let again = index.merge(&batch, None);
        assert!(again.is_zero_delta());
        assert_eq!(again.unchanged, 2);
        assert_eq!(again.refreshed(), 2);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_flag_change_is_classified() {
        let mut index = MessageIndex::new();
        index.merge(&[header("a", 1), header("b", 2)], None);

        let stats = index.merge(&[seen(header("a", 1)), header("b", 2)], None);
        assert_eq!(stats.flags_changed, 1);
        assert_eq!(stats.unchanged, 1);
        assert!(index.get_by_id(&MessageId::new("a")).unwrap().flags.is_seen());
    }

    #[test]
    fn test_deleted_marker_counts_as_state_change() {
        let mut index = MessageIndex::new();
        index.merge(&[header("a", 1)], None);

        let mut tombstone = header("a", 1);
        tombstone.deleted = true;
        let stats = index.merge(&[tombstone], None);
        assert_eq!(stats.flags_changed, 1);
        assert!(index.get(0).unwrap().deleted);
    }

    #[test]
    fn test_missing_from_declared_range_is_removed() {
        let mut index = MessageIndex::new();
        index.merge(&[header("a", 1), header("b", 5), header("c", 50)], None);

        let range = DateRange::new(base() - Duration::hours(10), base()).unwrap();
        let stats = index.merge(&[header("a", 1)], Some(&range));
        assert_eq!(stats.deleted_removed, 1);
        assert!(!index.contains(&MessageId::new("b")));
        // Outside the declared range, so absence proves nothing.
        assert!(index.contains(&MessageId::new("c")));
    }

    #[test]
    fn test_undeclared_batch_never_removes() {
        let mut index = MessageIndex::new();
        index.merge(&[header("a", 1), header("b", 5)], None);
        let stats = index.merge(&[header("a", 1)], None);
        assert_eq!(stats.deleted_removed, 0);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_conflicting_record_skipped_rest_applied() {
        let mut index = MessageIndex::new();
        index.merge(&[header("a", 1)], None);

        let reused = MessageHeader::new("a", base() - Duration::hours(30)).with_subject("other");
        let stats = index.merge(&[reused, header("b", 2)], None);
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.fully_new, 1);
        assert_eq!(index.get_by_id(&MessageId::new("a")).unwrap().date, base() - Duration::hours(1));
    }

    #[test]
    fn test_duplicate_identity_in_batch_counts_once() {
        let mut index = MessageIndex::new();
        let stats = index.merge(&[header("a", 1), header("a", 1)], None);
        assert_eq!(stats.fully_new, 1);
        assert_eq!(stats.conflicts, 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_bounds_and_counts() {
        let mut index = MessageIndex::new();
        index.merge(&[header("a", 1), header("b", 2), header("c", 3)], None);

        let b = header("b", 2).key();
        assert_eq!(index.lower_bound(&b), 1);
        assert_eq!(index.upper_bound(&b), 2);
        assert_eq!(index.count_since(base() - Duration::hours(2)), 2);

        let range = DateRange::new(base() - Duration::hours(3), base() - Duration::hours(1)).unwrap();
        assert_eq!(index.count_in(&range), 2);
    }

    #[test]
    fn test_from_headers_sorts_and_dedupes() {
        let index = MessageIndex::from_headers(vec![header("b", 2), header("a", 1), header("b", 2)]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(0).unwrap().id.as_str(), "a");
    }

    proptest! {
        #[test]
        fn prop_merge_twice_is_idempotent(
            ages in proptest::collection::vec(0i64..500, 0..40),
            seen_mask in proptest::collection::vec(any::<bool>(), 40),
        ) {
            let batch: Vec<_> = ages
                .iter()
                .enumerate()
                .map(|(i, age)| {
                    let h = header(&format!("m{i}"), *age);
                    if seen_mask[i] { seen(h) } else { h }
                })
                .collect();
            let range = DateRange::new(base() - Duration::hours(600), base() + Duration::hours(1)).unwrap();

            let mut index = MessageIndex::new();
            let first = index.merge(&batch, Some(&range));
            prop_assert_eq!(first.fully_new, batch.len());

            let snapshot = index.headers().to_vec();
            let second = index.merge(&batch, Some(&range));
            prop_assert!(second.is_zero_delta());
            prop_assert_eq!(index.headers(), snapshot.as_slice());
        }

        #[test]
        fn prop_index_stays_sorted_and_unique(
            batches in proptest::collection::vec(proptest::collection::vec(0i64..100, 0..10), 1..5),
        ) {
            let mut index = MessageIndex::new();
            for batch in &batches {
                let headers: Vec<_> = batch.iter().map(|age| header(&format!("id{age}"), *age)).collect();
                index.merge(&headers, None);
            }
            let keys: Vec<_> = index.iter().map(MessageHeader::key).collect();
            prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
