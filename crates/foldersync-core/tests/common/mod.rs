//! Shared fixtures for engine integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use foldersync_core::{
    AccountId, BlobStore, FolderId, MemoryBlobStore, MemoryTransport, MockClock, SyncConfig,
    SyncEngine, spaced_headers,
};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
}

pub fn inbox() -> FolderId {
    FolderId::new("INBOX")
}

/// 11.4 hours, the spacing of the 46-message dataset.
pub fn half_day() -> Duration {
    Duration::minutes(684)
}

/// A fake server, a shared blob store and a pinned clock that survive
/// engine restarts.
pub struct Harness {
    pub transport: Arc<MemoryTransport>,
    pub blobs: MemoryBlobStore,
    pub clock: Arc<MockClock>,
    pub config: SyncConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(MemoryTransport::new()),
            blobs: MemoryBlobStore::new(),
            clock: MockClock::shared(now()),
            config: SyncConfig::default(),
        }
    }

    /// A harness whose inbox holds `count` messages, the newest at `now`.
    pub fn with_inbox(count: usize, spacing: Duration) -> Self {
        let harness = Self::new();
        harness
            .transport
            .insert(&inbox(), spaced_headers(count, now(), spacing));
        harness
    }

    /// Starts an engine over the shared collaborators.
    pub async fn engine(&self) -> SyncEngine {
        self.engine_with_store(Arc::new(self.blobs.clone())).await
    }

    pub async fn engine_with_store(&self, store: Arc<dyn BlobStore>) -> SyncEngine {
        SyncEngine::load(
            AccountId(7),
            self.config.clone(),
            self.transport.clone(),
            store,
            self.clock.clone(),
        )
        .await
        .unwrap()
    }
}
