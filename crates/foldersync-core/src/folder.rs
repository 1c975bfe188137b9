//! Per-folder sync state: the index, its coverage and server bookkeeping.

use chrono::{DateTime, Utc};

use crate::coverage::CoverageTracker;
use crate::index::{MergeStats, MessageIndex};
use crate::model::{DateRange, FolderId};
use crate::store::FolderSnapshot;
use crate::transport::FetchedBatch;

/// Everything persisted for one folder.
///
/// Sync operations clone this into a working copy, apply fetched batches to
/// the copy and swap it in only once the whole operation has succeeded.
#[derive(Debug, Clone)]
pub struct FolderState {
    /// Folder identity.
    pub id: FolderId,
    /// Known headers.
    pub index: MessageIndex,
    /// Fully synchronized ranges.
    pub coverage: CoverageTracker,
    /// Message total last reported by the server.
    pub server_total: Option<usize>,
    /// Whether coverage has reached the account's oldest-date floor.
    pub floor_reached: bool,
    /// Whether a fetch below all older coverage came back empty once the
    /// index already matched the server total.
    pub oldest_confirmed: bool,
    /// Bumped on every applied batch.
    revision: u64,
    /// Revision last committed to durable storage.
    saved_revision: u64,
}

impl FolderState {
    /// Creates the state of a never-synced folder.
    #[must_use]
    pub fn new(id: FolderId) -> Self {
        Self {
            id,
            index: MessageIndex::new(),
            coverage: CoverageTracker::new(),
            server_total: None,
            floor_reached: false,
            oldest_confirmed: false,
            revision: 0,
            saved_revision: 0,
        }
    }

    /// Restores a folder exactly as it was committed.
    #[must_use]
    pub fn from_snapshot(snapshot: FolderSnapshot) -> Self {
        Self {
            id: snapshot.folder,
            index: MessageIndex::from_headers(snapshot.headers),
            coverage: CoverageTracker::from_intervals(snapshot.coverage),
            server_total: snapshot.server_total,
            floor_reached: snapshot.floor_reached,
            oldest_confirmed: snapshot.oldest_confirmed,
            revision: 0,
            saved_revision: 0,
        }
    }

    /// Captures the committable state.
    #[must_use]
    pub fn snapshot(&self) -> FolderSnapshot {
        FolderSnapshot {
            version: FolderSnapshot::CURRENT_VERSION,
            folder: self.id.clone(),
            headers: self.index.headers().to_vec(),
            coverage: self.coverage.intervals().to_vec(),
            server_total: self.server_total,
            floor_reached: self.floor_reached,
            oldest_confirmed: self.oldest_confirmed,
        }
    }

    /// Merges a successfully fetched batch and extends coverage by its range.
    pub fn apply(&mut self, batch: &FetchedBatch, floor: Option<DateTime<Utc>>) -> MergeStats {
        let below_coverage = self
            .coverage
            .oldest_start()
            .is_some_and(|oldest| batch.range.end() <= oldest);
        let stats = self.index.merge(&batch.headers, Some(&batch.range));
        self.coverage.extend(batch.range);
        if batch.server_total.is_some() {
            self.server_total = batch.server_total;
        }
        if below_coverage && batch.headers.is_empty() && self.total_reached() {
            self.oldest_confirmed = true;
        }
        if floor.is_some_and(|f| batch.range.start() <= f) {
            self.floor_reached = true;
        }
        self.revision += 1;
        stats
    }

    /// Whether no older message is expected beyond what is already known.
    ///
    /// Includes the server-total estimate, which stale headers in covered
    /// ranges can inflate; see [`history_confirmed`](Self::history_confirmed).
    #[must_use]
    pub fn history_exhausted(&self) -> bool {
        self.history_confirmed() || self.total_reached()
    }

    /// Whether the oldest end of the folder has actually been fetched.
    #[must_use]
    pub const fn history_confirmed(&self) -> bool {
        self.floor_reached || self.oldest_confirmed
    }

    fn total_reached(&self) -> bool {
        self.server_total
            .is_some_and(|total| self.index.len() >= total)
    }

    /// Whether changes are waiting to be committed.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// Current revision.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Revision last committed to durable storage.
    #[must_use]
    pub const fn saved_revision(&self) -> u64 {
        self.saved_revision
    }

    /// Records that `revision` reached durable storage.
    pub fn mark_saved(&mut self, revision: u64) {
        self.saved_revision = self.saved_revision.max(revision);
    }

    /// Number of headers in the covered block that starts at the newest
    /// covered interval and runs towards older mail.
    #[must_use]
    pub fn newest_block_len(&self) -> usize {
        self.coverage
            .newest()
            .map_or(0, |range| self.index.count_since(range.start()))
    }

    /// Number of leading index positions reachable from the block holding
    /// `anchor` without crossing uncovered time. Everything is reachable
    /// once history is exhausted; `None` when `anchor` lies in no block.
    #[must_use]
    pub fn contiguous_len(&self, anchor: Option<DateTime<Utc>>) -> Option<usize> {
        if self.history_exhausted() {
            return Some(self.index.len());
        }
        self.block_for(anchor)
            .map(|range| self.index.count_since(range.start()))
    }

    /// The covered interval holding `date`, or the newest one when `date`
    /// is `None`.
    #[must_use]
    pub fn block_for(&self, date: Option<DateTime<Utc>>) -> Option<&DateRange> {
        match date {
            Some(date) => self.coverage.interval_containing(date),
            None => self.coverage.newest(),
        }
    }
}
