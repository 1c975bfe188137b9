//! Durable storage of folder snapshots.
//!
//! A [`BlobStore`] keeps one opaque blob per `(account, folder)` and commits
//! any number of them atomically. [`PersistenceStore`] layers the versioned
//! JSON snapshot format on top.

mod memory;
mod model;
mod sqlite;

pub use memory::MemoryBlobStore;
pub use model::FolderSnapshot;
pub use sqlite::SqliteBlobStore;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::model::{AccountId, DateRange, FolderId};
use crate::{Error, Result};

/// Errors reported by a blob store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store refused or failed the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Key of one stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    /// Owning account.
    pub account: AccountId,
    /// Folder within the account.
    pub folder: FolderId,
}

impl StoreKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(account: AccountId, folder: FolderId) -> Self {
        Self { account, folder }
    }
}

/// Key/blob storage with atomic multi-key commits.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes every entry, or none of them.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the commit failed. Previously committed
    /// blobs are then unchanged.
    async fn commit(&self, entries: Vec<(StoreKey, Vec<u8>)>) -> std::result::Result<(), StoreError>;

    /// Reads every blob committed for `account`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read.
    async fn load(&self, account: AccountId) -> std::result::Result<Vec<(StoreKey, Vec<u8>)>, StoreError>;
}

/// Snapshot codec and commit front-end for one account.
#[derive(Clone)]
pub struct PersistenceStore {
    account: AccountId,
    blobs: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for PersistenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceStore")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl PersistenceStore {
    /// Creates a store front-end for `account`.
    #[must_use]
    pub fn new(account: AccountId, blobs: Arc<dyn BlobStore>) -> Self {
        Self { account, blobs }
    }

    /// The account this store belongs to.
    #[must_use]
    pub const fn account(&self) -> AccountId {
        self.account
    }

    /// Commits every snapshot in one atomic write.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the commit fails.
    pub async fn commit(&self, snapshots: &[FolderSnapshot]) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }
        let entries = snapshots
            .iter()
            .map(|snapshot| {
                let key = StoreKey::new(self.account, snapshot.folder.clone());
                encode(snapshot).map(|bytes| (key, bytes))
            })
            .collect::<Result<Vec<_>>>()?;

        self.blobs.commit(entries).await?;
        info!(account = %self.account, folders = snapshots.len(), "Committed folder state");
        Ok(())
    }

    /// Loads every committed snapshot of the account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptSnapshot`] if a blob cannot be decoded, or a
    /// persistence error if the store cannot be read.
    pub async fn load(&self) -> Result<Vec<FolderSnapshot>> {
        let blobs = self.blobs.load(self.account).await?;
        let snapshots = blobs
            .into_iter()
            .map(|(key, bytes)| decode(&key.folder, &bytes))
            .collect::<Result<Vec<_>>>()?;
        debug!(account = %self.account, folders = snapshots.len(), "Loaded folder state");
        Ok(snapshots)
    }
}

/// Encodes a snapshot as JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(snapshot: &FolderSnapshot) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(snapshot)?)
}

/// Decodes and validates a snapshot stored under `folder`.
///
/// # Errors
///
/// Returns [`Error::CorruptSnapshot`] for undecodable JSON, an unknown
/// version, a folder mismatch or an empty coverage range.
pub fn decode(folder: &FolderId, bytes: &[u8]) -> Result<FolderSnapshot> {
    let corrupt = |reason: String| Error::CorruptSnapshot {
        folder: folder.to_string(),
        reason,
    };

    let snapshot: FolderSnapshot =
        serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    if snapshot.version != FolderSnapshot::CURRENT_VERSION {
        return Err(corrupt(format!("unsupported version {}", snapshot.version)));
    }
    if &snapshot.folder != folder {
        return Err(corrupt(format!("stored under {folder} but names {}", snapshot.folder)));
    }
    if let Some(range) = snapshot
        .coverage
        .iter()
        .find(|r| DateRange::new(r.start(), r.end()).is_none())
    {
        return Err(corrupt(format!("empty coverage range {range}")));
    }
    Ok(snapshot)
}
