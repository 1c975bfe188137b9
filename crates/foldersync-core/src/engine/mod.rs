//! The sync engine: one per account and run.
//!
//! [`SyncEngine`] owns the configuration, the collaborators and the folder
//! registry. Views borrow its shared context; nothing is global.

mod registry;

pub(crate) use registry::FolderEntry;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::folder::FolderState;
use crate::index::MergeStats;
use crate::model::{AccountId, DateRange, FolderId};
use crate::planner::SyncPlanner;
use crate::store::{BlobStore, PersistenceStore};
use crate::transport::{FetchExecutor, MailTransport};
use crate::view::{FolderView, ViewCapabilities, ViewUpdate};
use crate::{Error, Result};

use registry::FolderRegistry;

/// Context shared by the engine handle and its views.
pub(crate) struct EngineInner {
    pub(crate) planner: SyncPlanner,
    pub(crate) clock: Arc<dyn Clock>,
    executor: FetchExecutor,
    store: PersistenceStore,
    folders: FolderRegistry,
    shutdown: CancellationToken,
    /// Serializes `save_state` calls.
    commit: tokio::sync::Mutex<()>,
}

impl EngineInner {
    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Fetches `range` and applies it to a working copy.
    pub(crate) async fn fetch_into(
        &self,
        working: &mut FolderState,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> Result<MergeStats> {
        let batch = self.executor.fetch(&working.id, range, cancel).await?;
        let stats = working.apply(&batch, self.planner.config().oldest_date_floor);
        debug!(
            folder = %working.id,
            %range,
            new = stats.fully_new,
            changed = stats.flags_changed,
            removed = stats.deleted_removed,
            conflicts = stats.conflicts,
            "Applied batch"
        );
        Ok(stats)
    }

    /// Runs the open-time sync: a refresh or initial range, then widening
    /// into older history until `target` messages are reachable.
    ///
    /// Nothing is installed unless every fetch succeeds.
    pub(crate) async fn sync_open(&self, entry: &FolderEntry, target: usize) -> Result<MergeStats> {
        let cancel = entry.cancel_token();
        let _sync = entry.lock_sync(&cancel).await?;
        let mut working = entry.working_copy();
        let mut stats = MergeStats::default();

        if let Some(range) = self.planner.open_range(&working, target, self.clock.now()) {
            stats.accumulate(&self.fetch_into(&mut working, range, &cancel).await?);
        }

        let mut attempt = 0;
        while self.planner.wants_more(&working, target) {
            let Some(range) = self.planner.widening_range(&working, attempt) else {
                break;
            };
            stats.accumulate(&self.fetch_into(&mut working, range, &cancel).await?);
            attempt += 1;
        }

        entry.install(working);
        Ok(stats)
    }
}

/// Handle to a running sync engine. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    account: AccountId,
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("account", &self.account)
            .field("shut_down", &self.inner.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Starts an engine for `account`, restoring every folder last committed
    /// to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration,
    /// [`Error::CorruptSnapshot`] for an undecodable stored folder, or a
    /// persistence error if the store cannot be read.
    pub async fn load(
        account: AccountId,
        config: SyncConfig,
        transport: Arc<dyn MailTransport>,
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let store = PersistenceStore::new(account, store);
        let states: Vec<FolderState> = store
            .load()
            .await?
            .into_iter()
            .map(FolderState::from_snapshot)
            .collect();
        info!(%account, folders = states.len(), "Loaded sync state");

        let shutdown = CancellationToken::new();
        let inner = EngineInner {
            planner: SyncPlanner::new(config),
            clock,
            executor: FetchExecutor::new(transport),
            store,
            folders: FolderRegistry::restore(states, &shutdown),
            shutdown,
            commit: tokio::sync::Mutex::new(()),
        };
        Ok(Self {
            account,
            inner: Arc::new(inner),
        })
    }

    /// The account this engine syncs.
    #[must_use]
    pub const fn account(&self) -> AccountId {
        self.account
    }

    /// Opens a view showing up to `target` of the folder's newest messages,
    /// syncing first unless the view is offline. The folder is created on
    /// first reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutDown`] after [`shutdown`](Self::shutdown), or
    /// the fetch error that aborted the open sync. A failed open changes
    /// nothing.
    pub async fn open_view(
        &self,
        folder: &FolderId,
        target: usize,
        capabilities: ViewCapabilities,
    ) -> Result<(FolderView, ViewUpdate)> {
        if self.inner.is_shut_down() {
            return Err(Error::ShutDown);
        }
        let entry = self.inner.folders.get_or_create(folder, &self.inner.shutdown);
        FolderView::open(
            Arc::clone(&self.inner),
            entry,
            folder.clone(),
            target,
            capabilities,
        )
        .await
    }

    /// Commits every dirty folder in one atomic write. Returns how many
    /// folders were written.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the commit fails. Previously committed
    /// state is then intact and the folders stay dirty for a retry.
    pub async fn save_state(&self) -> Result<usize> {
        let _commit = self.inner.commit.lock().await;

        let mut pending = Vec::new();
        let mut snapshots = Vec::new();
        for entry in self.inner.folders.entries() {
            let state = entry.read();
            if state.is_dirty() {
                snapshots.push(state.snapshot());
                pending.push((Arc::clone(&entry), state.revision()));
            }
        }
        if snapshots.is_empty() {
            debug!(account = %self.account, "Nothing to save");
            return Ok(0);
        }

        self.inner
            .store
            .commit(&snapshots)
            .await
            .inspect_err(|e| warn!(account = %self.account, error = %e, "Save failed"))?;
        for (entry, revision) in &pending {
            entry.mark_saved(*revision);
        }
        Ok(pending.len())
    }

    /// Cancels in-flight work on every folder and closes all views.
    ///
    /// Later view operations fail with [`Error::ShutDown`]. Saving remains
    /// possible so a caller can flush state on the way out.
    pub fn shutdown(&self) {
        if !self.inner.is_shut_down() {
            info!(account = %self.account, "Shutting down sync engine");
            self.inner.shutdown.cancel();
        }
    }

    /// Cancels in-flight work on one folder. Its views stay open and later
    /// operations run normally. Returns whether the folder is known.
    pub fn shutdown_folder(&self, folder: &FolderId) -> bool {
        let known = self.inner.folders.cancel_folder(folder, &self.inner.shutdown);
        if known {
            info!(%folder, "Cancelled folder work");
        }
        known
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }

    /// Folders the engine knows, sorted by id.
    #[must_use]
    pub fn folder_ids(&self) -> Vec<FolderId> {
        self.inner
            .folders
            .entries()
            .iter()
            .map(|entry| entry.read().id.clone())
            .collect()
    }

    /// A copy of one folder's current state.
    #[must_use]
    pub fn folder_state(&self, folder: &FolderId) -> Option<FolderState> {
        self.inner.folders.get(folder).map(|entry| entry.working_copy())
    }

    /// Number of open views on a folder.
    #[must_use]
    pub fn view_count(&self, folder: &FolderId) -> usize {
        self.inner
            .folders
            .get(folder)
            .map_or(0, |entry| entry.view_count())
    }
}
