//! In-memory blob store with commit fault injection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{BlobStore, StoreError, StoreKey};
use crate::model::AccountId;

#[derive(Debug, Default)]
struct Blobs {
    committed: BTreeMap<StoreKey, Vec<u8>>,
    /// Entries written before the injected failure fires.
    fail_after: Option<usize>,
    commits: usize,
}

/// Blob store held in memory.
///
/// Clones share the same blobs, so a test can drop an engine and load a new
/// one from the same handle to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<Blobs>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Blobs> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next commit fail after staging `written` entries.
    pub fn fail_next_commit(&self, written: usize) {
        self.lock().fail_after = Some(written);
    }

    /// Number of successful commits.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    /// Raw blob under `key`, if committed.
    #[must_use]
    pub fn get(&self, key: &StoreKey) -> Option<Vec<u8>> {
        self.lock().committed.get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn commit(&self, entries: Vec<(StoreKey, Vec<u8>)>) -> Result<(), StoreError> {
        let mut blobs = self.lock();
        let fail_after = blobs.fail_after.take();

        let mut staging = blobs.committed.clone();
        for (written, (key, bytes)) in entries.into_iter().enumerate() {
            if fail_after == Some(written) {
                return Err(StoreError::Unavailable(format!(
                    "write aborted after {written} entries"
                )));
            }
            staging.insert(key, bytes);
        }
        if fail_after.is_some() {
            return Err(StoreError::Unavailable("commit aborted".into()));
        }

        blobs.committed = staging;
        blobs.commits += 1;
        Ok(())
    }

    async fn load(&self, account: AccountId) -> Result<Vec<(StoreKey, Vec<u8>)>, StoreError> {
        Ok(self
            .lock()
            .committed
            .iter()
            .filter(|(key, _)| key.account == account)
            .map(|(key, bytes)| (key.clone(), bytes.clone()))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::FolderId;

    fn key(folder: &str) -> StoreKey {
        StoreKey::new(AccountId(1), FolderId::new(folder))
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_previous_blobs() {
        let store = MemoryBlobStore::new();
        store
            .commit(vec![(key("INBOX"), b"v1".to_vec())])
            .await
            .unwrap();

        store.fail_next_commit(1);
        let result = store
            .commit(vec![
                (key("INBOX"), b"v2".to_vec()),
                (key("Sent"), b"v2".to_vec()),
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(store.get(&key("INBOX")).unwrap(), b"v1");
        assert!(store.get(&key("Sent")).is_none());
        assert_eq!(store.commit_count(), 1);

        store
            .commit(vec![(key("INBOX"), b"v2".to_vec())])
            .await
            .unwrap();
        assert_eq!(store.get(&key("INBOX")).unwrap(), b"v2");
    }
}
