//! Consumer windows onto a folder's index.
//!
//! A [`FolderView`] does not own message data. It holds two anchored edges
//! over the shared folder state, so every view of a folder sees the same
//! headers and a grow by one view shows up in the others on their next read.
//!
//! ```text
//! Opening ──► Ready ◄──► Growing
//!               │ ▲
//!               ▼ │
//!            Shrinking          (any state) ──► Closed
//! ```

mod bounds;

use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::{EngineInner, FolderEntry};
use crate::folder::FolderState;
use crate::index::MergeStats;
use crate::model::{FolderId, MessageHeader, SyncResult};
use crate::planner::{Direction, GrowPlan, GrowRequest, Window};
use crate::{Error, Result};

use bounds::Bounds;

/// Lifecycle state of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Initial sync in progress.
    Opening,
    /// Idle and usable.
    Ready,
    /// A grow is in progress.
    Growing,
    /// A shrink is in progress.
    Shrinking,
    /// Closed, or the engine shut down.
    Closed,
}

/// Where a view sits relative to its folder's known data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundaryFlags {
    /// The newer edge is at the newest indexed message and coverage reaches
    /// the present.
    pub touches_newest: bool,
    /// The older edge is at the oldest message reachable through contiguous
    /// coverage.
    pub touches_oldest: bool,
    /// Growing older could still show more messages.
    pub can_grow: bool,
}

/// What a view may do when it opens or grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewCapabilities {
    /// Never fetch while opening; show only stored data.
    pub offline: bool,
    /// May extend past local data by fetching.
    pub growable: bool,
}

impl Default for ViewCapabilities {
    fn default() -> Self {
        Self {
            offline: false,
            growable: true,
        }
    }
}

/// How a grow was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowOutcome {
    /// From already indexed messages.
    Local,
    /// After fetching a new range.
    Fetched,
    /// Refused because it needed a fetch without explicit permission.
    Declined,
}

/// Result of a view operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewUpdate {
    /// Classification counts; `total_visible` is the view's new size.
    pub result: SyncResult,
    /// Boundary flags after the operation.
    pub flags: BoundaryFlags,
    /// How the operation was satisfied. Opens and shrinks report `Local`
    /// unless they fetched.
    pub outcome: GrowOutcome,
}

/// A growable, shrinkable window over one folder.
///
/// Dropping a view releases its registration, like [`close`](Self::close).
pub struct FolderView {
    engine: Arc<EngineInner>,
    entry: Arc<FolderEntry>,
    folder: FolderId,
    bounds: Bounds,
    capabilities: ViewCapabilities,
    state: ViewState,
}

impl std::fmt::Debug for FolderView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderView")
            .field("folder", &self.folder)
            .field("bounds", &self.bounds)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl FolderView {
    /// Syncs the folder for a new view and shows up to `target` of its
    /// newest messages.
    pub(crate) async fn open(
        engine: Arc<EngineInner>,
        entry: Arc<FolderEntry>,
        folder: FolderId,
        target: usize,
        capabilities: ViewCapabilities,
    ) -> Result<(Self, ViewUpdate)> {
        let mut view = Self {
            engine,
            entry,
            folder,
            bounds: Bounds::empty(),
            capabilities,
            state: ViewState::Opening,
        };
        // Released by `Drop` if the open fails.
        view.entry.register_view();

        let (stats, fetched) = if capabilities.offline {
            (MergeStats::default(), false)
        } else {
            (view.engine.sync_open(&view.entry, target).await?, true)
        };

        let update = {
            let live = view.entry.read();
            let reach = live.contiguous_len(None).unwrap_or(0);
            let window = Window {
                start: 0,
                end: target.min(reach),
            };
            view.bounds = Bounds::anchor(&live.index, window);
            let outcome = if fetched {
                GrowOutcome::Fetched
            } else {
                GrowOutcome::Local
            };
            view.update(&live, window, stats, outcome)
        };

        view.state = ViewState::Ready;
        info!(
            folder = %view.folder,
            visible = update.result.total_visible,
            new = update.result.fully_new,
            "Opened view"
        );
        Ok((view, update))
    }

    /// The folder this view shows.
    #[must_use]
    pub const fn folder_id(&self) -> &FolderId {
        &self.folder
    }

    /// Current lifecycle state. Reports `Closed` once the engine shut down.
    #[must_use]
    pub fn state(&self) -> ViewState {
        if self.engine.is_shut_down() {
            ViewState::Closed
        } else {
            self.state
        }
    }

    /// Visible headers, newest first.
    #[must_use]
    pub fn headers(&self) -> Vec<MessageHeader> {
        let live = self.entry.read();
        let window = self.bounds.resolve(&live.index);
        live.index.headers()[window.start..window.end].to_vec()
    }

    /// Number of visible messages.
    #[must_use]
    pub fn total(&self) -> usize {
        self.bounds.resolve(&self.entry.read().index).len()
    }

    /// Current boundary flags.
    #[must_use]
    pub fn flags(&self) -> BoundaryFlags {
        let live = self.entry.read();
        let window = self.bounds.resolve(&live.index);
        self.boundary_flags(&live, window)
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.state == ViewState::Closed {
            return Err(Error::ViewClosed);
        }
        if self.engine.is_shut_down() {
            return Err(Error::ShutDown);
        }
        Ok(())
    }

    /// Extends the view by up to `delta` messages towards `direction`.
    ///
    /// Messages already indexed inside contiguous coverage are shown without
    /// fetching. Otherwise a fetch of the next uncovered range happens only
    /// with `explicit_permission`; without it the request is declined and
    /// nothing changes.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the fetch fails, [`Error::Cancelled`] if
    /// the folder or engine shuts down meanwhile, and [`Error::ViewClosed`]
    /// or [`Error::ShutDown`] for an unusable view. The view and folder are
    /// unchanged on error.
    pub async fn grow(
        &mut self,
        direction: Direction,
        delta: usize,
        explicit_permission: bool,
    ) -> Result<ViewUpdate> {
        self.ensure_usable()?;
        self.state = ViewState::Growing;
        let request = GrowRequest {
            direction,
            delta,
            explicit_permission,
        };
        let update = self.grow_inner(request).await;
        self.state = ViewState::Ready;
        update
    }

    async fn grow_inner(&mut self, request: GrowRequest) -> Result<ViewUpdate> {
        let entry = Arc::clone(&self.entry);
        let engine = Arc::clone(&self.engine);
        let cancel = entry.cancel_token();
        let _sync = entry.lock_sync(&cancel).await?;
        let now = engine.clock.now();

        let plan = {
            let live = entry.read();
            let window = self.bounds.resolve(&live.index);
            let plan = engine.planner.plan_grow(
                &live,
                window,
                request,
                self.capabilities.growable,
                now,
            );
            match plan {
                GrowPlan::Local(count) => {
                    let grown = window.grown(request.direction, count);
                    self.bounds = Bounds::anchor(&live.index, grown);
                    return Ok(self.update(&live, grown, MergeStats::default(), GrowOutcome::Local));
                }
                GrowPlan::Decline => {
                    debug!(folder = %self.folder, ?request, "Grow declined");
                    return Ok(self.update(&live, window, MergeStats::default(), GrowOutcome::Declined));
                }
                GrowPlan::Fetch(range) => range,
            }
        };

        let mut working = entry.working_copy();
        let stats = engine.fetch_into(&mut working, plan, &cancel).await?;

        // Show what the fetch made reachable, without fetching again.
        let window = self.bounds.resolve(&working.index);
        let follow = GrowRequest {
            explicit_permission: false,
            ..request
        };
        let count = match engine.planner.plan_grow(&working, window, follow, false, now) {
            GrowPlan::Local(count) => count,
            GrowPlan::Fetch(_) | GrowPlan::Decline => 0,
        };
        let grown = window.grown(request.direction, count);
        let update = self.update(&working, grown, stats, GrowOutcome::Fetched);

        self.bounds = Bounds::anchor(&working.index, grown);
        entry.install(working);
        Ok(update)
    }

    /// Removes messages from the view's edges without fetching.
    ///
    /// A positive offset removes that many messages from its edge. A
    /// negative offset `-k` names a boundary position counted from the
    /// edge; with inclusive offsets (the default) it removes `k - 1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ViewClosed`] or [`Error::ShutDown`] for an unusable
    /// view.
    pub fn shrink(&mut self, top_offset: i64, bottom_offset: i64) -> Result<ViewUpdate> {
        self.ensure_usable()?;
        self.state = ViewState::Shrinking;

        let inclusive = self.engine.planner.config().negative_offset_inclusive;
        let update = {
            let live = self.entry.read();
            let window = self.bounds.resolve(&live.index);
            let shrunk = window.shrunk(
                removal_count(top_offset, inclusive),
                removal_count(bottom_offset, inclusive),
            );
            self.bounds = Bounds::anchor(&live.index, shrunk);
            self.update(&live, shrunk, MergeStats::default(), GrowOutcome::Local)
        };

        self.state = ViewState::Ready;
        debug!(
            folder = %self.folder,
            top_offset,
            bottom_offset,
            visible = update.result.total_visible,
            "Shrunk view"
        );
        Ok(update)
    }

    /// Releases the view. The folder and its data stay.
    pub fn close(&mut self) {
        if self.state != ViewState::Closed {
            self.entry.release_view();
            self.state = ViewState::Closed;
            debug!(folder = %self.folder, "Closed view");
        }
    }

    fn boundary_flags(&self, folder: &FolderState, window: Window) -> BoundaryFlags {
        let bottom_date = window
            .end
            .checked_sub(1)
            .and_then(|pos| folder.index.get(pos))
            .map(|h| h.date);
        let reach = folder.contiguous_len(bottom_date).unwrap_or(window.end);
        let live_top = folder
            .coverage
            .newest_end()
            .is_some_and(|end| end > self.engine.clock.now());
        BoundaryFlags {
            touches_newest: window.start == 0 && live_top,
            touches_oldest: window.end >= reach,
            can_grow: window.end < reach
                || (self.capabilities.growable && !folder.history_exhausted()),
        }
    }

    fn update(
        &self,
        folder: &FolderState,
        window: Window,
        stats: MergeStats,
        outcome: GrowOutcome,
    ) -> ViewUpdate {
        ViewUpdate {
            result: stats.to_result(window.len()),
            flags: self.boundary_flags(folder, window),
            outcome,
        }
    }
}

impl Drop for FolderView {
    fn drop(&mut self) {
        self.close();
    }
}

/// Messages a shrink offset removes from its edge.
fn removal_count(offset: i64, inclusive: bool) -> usize {
    let count = usize::try_from(offset.unsigned_abs()).unwrap_or(usize::MAX);
    if offset < 0 && inclusive {
        count - 1
    } else {
        count
    }
}
