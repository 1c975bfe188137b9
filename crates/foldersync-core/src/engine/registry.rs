//! Live folders known to an engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use tokio_util::sync::CancellationToken;

use crate::folder::FolderState;
use crate::model::FolderId;
use crate::{Error, Result};

/// One folder's live state and the locks around it.
#[derive(Debug)]
pub(crate) struct FolderEntry {
    /// Serializes fetch-and-merge work on this folder.
    sync: tokio::sync::Mutex<()>,
    state: RwLock<FolderState>,
    cancel: Mutex<CancellationToken>,
    views: AtomicUsize,
}

impl FolderEntry {
    fn new(state: FolderState, parent: &CancellationToken) -> Self {
        Self {
            sync: tokio::sync::Mutex::new(()),
            state: RwLock::new(state),
            cancel: Mutex::new(parent.child_token()),
            views: AtomicUsize::new(0),
        }
    }

    /// Shared read access to the live state.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, FolderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// A private copy to apply fetched batches to.
    pub(crate) fn working_copy(&self) -> FolderState {
        self.read().clone()
    }

    /// Swaps a finished working copy in as the live state.
    pub(crate) fn install(&self, mut working: FolderState) {
        let mut live = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // A save may have completed while the copy was being worked on.
        working.mark_saved(live.saved_revision());
        *live = working;
    }

    /// Records that `revision` was committed.
    pub(crate) fn mark_saved(&self, revision: u64) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mark_saved(revision);
    }

    /// Token that in-flight work on this folder races against.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cancels in-flight work and arms a fresh token for later operations.
    fn cancel_in_flight(&self, parent: &CancellationToken) {
        let mut token = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        token.cancel();
        *token = parent.child_token();
    }

    /// Waits for exclusive sync access, giving up if `cancel` fires.
    pub(crate) async fn lock_sync(
        &self,
        cancel: &CancellationToken,
    ) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            guard = self.sync.lock() => Ok(guard),
        }
    }

    pub(crate) fn register_view(&self) {
        self.views.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release_view(&self) {
        self.views.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn view_count(&self) -> usize {
        self.views.load(Ordering::SeqCst)
    }
}

/// Folder lookup table. Folders are created on first reference and live as
/// long as the engine.
#[derive(Debug, Default)]
pub(crate) struct FolderRegistry {
    folders: RwLock<HashMap<FolderId, Arc<FolderEntry>>>,
}

impl FolderRegistry {
    /// Builds a registry from restored folder states.
    pub(crate) fn restore(states: Vec<FolderState>, parent: &CancellationToken) -> Self {
        let folders = states
            .into_iter()
            .map(|state| (state.id.clone(), Arc::new(FolderEntry::new(state, parent))))
            .collect();
        Self {
            folders: RwLock::new(folders),
        }
    }

    pub(crate) fn get(&self, id: &FolderId) -> Option<Arc<FolderEntry>> {
        self.folders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub(crate) fn get_or_create(&self, id: &FolderId, parent: &CancellationToken) -> Arc<FolderEntry> {
        if let Some(entry) = self.get(id) {
            return entry;
        }
        let mut folders = self.folders.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(folders.entry(id.clone()).or_insert_with(|| {
            tracing::debug!(folder = %id, "Creating folder");
            Arc::new(FolderEntry::new(FolderState::new(id.clone()), parent))
        }))
    }

    /// Every folder, ordered by id.
    pub(crate) fn entries(&self) -> Vec<Arc<FolderEntry>> {
        let folders = self.folders.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = folders.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, entry)| Arc::clone(entry)).collect()
    }

    /// Cancels in-flight work on one folder. Returns whether it exists.
    pub(crate) fn cancel_folder(&self, id: &FolderId, parent: &CancellationToken) -> bool {
        let Some(entry) = self.get(id) else {
            return false;
        };
        entry.cancel_in_flight(parent);
        true
    }
}
