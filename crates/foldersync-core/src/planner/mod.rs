//! Sync range planning.
//!
//! The planner only computes ranges; fetching and merging are done by the
//! engine. Every width it uses comes from [`SyncConfig`].

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::SyncConfig;
use crate::folder::FolderState;
use crate::model::DateRange;

/// Direction in which a view grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards more recent messages (the top of the view).
    Newer,
    /// Towards older messages (the bottom of the view).
    Older,
}

/// Positions `[start, end)` of a view within its folder's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    /// First visible position (0 is the newest message).
    pub start: usize,
    /// One past the last visible position.
    pub end: usize,
}

impl Window {
    /// Number of visible positions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether nothing is visible.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The window extended by `count` positions towards `direction`.
    #[must_use]
    pub const fn grown(self, direction: Direction, count: usize) -> Self {
        match direction {
            Direction::Older => Self {
                start: self.start,
                end: self.end + count,
            },
            Direction::Newer => Self {
                start: self.start.saturating_sub(count),
                end: self.end,
            },
        }
    }

    /// The window with `top` positions dropped from the newer edge and
    /// `bottom` from the older edge, never past each other.
    #[must_use]
    pub fn shrunk(self, top: usize, bottom: usize) -> Self {
        let top = top.min(self.len());
        let bottom = bottom.min(self.len() - top);
        Self {
            start: self.start + top,
            end: self.end - bottom,
        }
    }
}

/// What a grow request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowPlan {
    /// Extend the view by this many already-indexed messages. May be fewer
    /// than requested when no more messages exist.
    Local(usize),
    /// Fetch this range, then extend the view from the merged index.
    Fetch(DateRange),
    /// The request needs uncovered data and the caller did not permit a
    /// fetch. Nothing changes.
    Decline,
}

/// A consumer's request to extend a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowRequest {
    /// Edge to extend.
    pub direction: Direction,
    /// Number of additional messages wanted.
    pub delta: usize,
    /// Whether the consumer allows fetching beyond current coverage.
    pub explicit_permission: bool,
}

/// Computes which date ranges to fetch.
#[derive(Debug, Clone)]
pub struct SyncPlanner {
    config: SyncConfig,
}

impl SyncPlanner {
    /// Creates a planner for the given policy.
    #[must_use]
    pub const fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// The policy in use.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The newest instant any sync range reaches.
    fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.config.future_slop())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Clamps a range start to the account floor.
    fn floor_clamp(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        self.config.oldest_date_floor.map_or(start, |f| start.max(f))
    }

    /// First range to fetch when a view opens.
    ///
    /// A never-synced folder gets the initial window ending at the horizon.
    /// A folder with coverage is refreshed from its `target`-th newest
    /// known message (or the start of the newest covered interval when
    /// fewer are known) up to the horizon.
    #[must_use]
    pub fn open_range(
        &self,
        folder: &FolderState,
        target: usize,
        now: DateTime<Utc>,
    ) -> Option<DateRange> {
        let horizon = self.horizon(now);
        let range = match folder.coverage.newest() {
            None => {
                let start = now.checked_sub_signed(self.config.initial_window())?;
                DateRange::new(self.floor_clamp(start), horizon)
            }
            Some(newest) => {
                let start = if target > 0 && folder.newest_block_len() >= target {
                    folder
                        .index
                        .get(target - 1)
                        .map_or(newest.start(), |h| h.date)
                } else {
                    newest.start()
                };
                DateRange::new(start, horizon.max(newest.end()))
            }
        };
        debug!(folder = %folder.id, ?range, target, "Planned open range");
        range
    }

    /// Whether an opening view should keep widening into older history.
    #[must_use]
    pub fn wants_more(&self, folder: &FolderState, target: usize) -> bool {
        folder.newest_block_len() < target && !folder.history_exhausted()
    }

    /// Next older range to fetch while an opening view is short of its
    /// target, or `None` when the schedule is spent or the floor is reached.
    #[must_use]
    pub fn widening_range(&self, folder: &FolderState, attempt: usize) -> Option<DateRange> {
        let width = self.config.widening(attempt)?;
        let upper = folder.coverage.newest()?.start();
        let lower = self.older_limit(folder, upper, upper.checked_sub_signed(width)?);
        let range = DateRange::new(lower, upper);
        debug!(folder = %folder.id, attempt, ?range, "Planned widening range");
        range
    }

    /// Clips a proposed lower bound so the range below `upper` neither
    /// overlaps older coverage nor crosses the account floor.
    fn older_limit(
        &self,
        folder: &FolderState,
        upper: DateTime<Utc>,
        proposed: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let lower = folder
            .coverage
            .covered_end_before(upper)
            .map_or(proposed, |end| proposed.max(end));
        self.floor_clamp(lower)
    }

    /// Decides how to satisfy a grow request.
    ///
    /// `growable` is the view's capability to extend past local data.
    #[must_use]
    pub fn plan_grow(
        &self,
        folder: &FolderState,
        window: Window,
        request: GrowRequest,
        growable: bool,
        now: DateTime<Utc>,
    ) -> GrowPlan {
        if request.delta == 0 {
            return GrowPlan::Local(0);
        }
        let plan = match request.direction {
            Direction::Older => self.plan_older(folder, window, request, growable, now),
            Direction::Newer => self.plan_newer(folder, window, request, growable, now),
        };
        debug!(folder = %folder.id, ?request, ?plan, "Planned grow");
        plan
    }

    fn plan_older(
        &self,
        folder: &FolderState,
        window: Window,
        request: GrowRequest,
        growable: bool,
        now: DateTime<Utc>,
    ) -> GrowPlan {
        let GrowRequest {
            delta,
            explicit_permission,
            ..
        } = request;
        let index = &folder.index;
        let bottom_date = window
            .end
            .checked_sub(1)
            .and_then(|pos| index.get(pos))
            .map(|h| h.date);
        let limit = folder.contiguous_len(bottom_date).unwrap_or(window.end);
        let available = limit.saturating_sub(window.end);
        if available >= delta {
            return GrowPlan::Local(delta);
        }
        if !growable || folder.history_confirmed() {
            return GrowPlan::Local(available);
        }
        // The server total is only an estimate; an explicit grow checks for
        // itself.
        if !explicit_permission {
            return if folder.history_exhausted() {
                GrowPlan::Local(available)
            } else {
                GrowPlan::Decline
            };
        }

        let upper = folder
            .block_for(bottom_date)
            .map_or_else(|| self.horizon(now), DateRange::start);
        let Some(proposed) = upper.checked_sub_signed(self.config.grow_window()) else {
            return GrowPlan::Local(available);
        };
        let lower = self.older_limit(folder, upper, proposed);
        DateRange::new(lower, upper).map_or(GrowPlan::Local(available), GrowPlan::Fetch)
    }

    fn plan_newer(
        &self,
        folder: &FolderState,
        window: Window,
        request: GrowRequest,
        growable: bool,
        now: DateTime<Utc>,
    ) -> GrowPlan {
        let GrowRequest {
            delta,
            explicit_permission,
            ..
        } = request;
        let index = &folder.index;
        let top_date = index.get(window.start).map(|h| h.date);
        let Some(block) = folder.block_for(top_date) else {
            return GrowPlan::Local(delta.min(window.start));
        };

        let first_reachable = index.count_since(block.end());
        let available = window.start.saturating_sub(first_reachable);
        if available >= delta {
            return GrowPlan::Local(delta);
        }
        // Coverage already reaches the present; nothing newer can be missing.
        if block.end() > now || !growable {
            return GrowPlan::Local(available);
        }
        if !explicit_permission {
            return GrowPlan::Decline;
        }

        let horizon = self.horizon(now);
        let upper = folder
            .coverage
            .covered_start_after(block.end())
            .map_or(horizon, |start| start.min(horizon));
        DateRange::new(block.end(), upper).map_or(GrowPlan::Local(available), GrowPlan::Fetch)
    }
}
