//! # foldersync-core
//!
//! Folder sync and view-window engine for an offline-capable mail client.
//!
//! This crate provides:
//! - **Message index** - per-folder, date-ordered header store with idempotent merge
//! - **Coverage tracking** - the date ranges known to be completely synchronized
//! - **Sync planning** - how much history to fetch when a window opens or grows
//! - **Folder views** - growable/shrinkable windows with boundary flags
//! - **Persistence** - atomic commit and reload of every dirty folder
//!
//! ## Example
//!
//! ```ignore
//! use foldersync_core::{AccountId, Direction, FolderId, SyncConfig, SyncEngine, ViewCapabilities};
//!
//! let engine = SyncEngine::load(AccountId(1), SyncConfig::default(), transport, store, clock).await?;
//! let (mut view, update) = engine
//!     .open_view(&FolderId::new("INBOX"), 50, ViewCapabilities::default())
//!     .await?;
//! println!("{} visible, {} new", update.result.total_visible, update.result.fully_new);
//!
//! // Fetch a week of older mail because the user scrolled to the bottom.
//! view.grow(Direction::Older, 25, true).await?;
//! engine.save_state().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod coverage;
pub mod engine;
mod error;
pub mod folder;
pub mod index;
pub mod model;
pub mod planner;
pub mod store;
pub mod transport;
pub mod view;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::SyncConfig;
pub use coverage::CoverageTracker;
pub use engine::SyncEngine;
pub use error::{Error, Result};
pub use folder::FolderState;
pub use index::{MergeStats, MessageIndex};
pub use model::{
    AccountId, DateRange, Flags, FolderId, IndexKey, MessageHeader, MessageId, SyncResult,
};
pub use planner::{Direction, GrowPlan, GrowRequest, SyncPlanner, Window};
pub use store::{
    BlobStore, FolderSnapshot, MemoryBlobStore, PersistenceStore, SqliteBlobStore, StoreError,
    StoreKey,
};
pub use transport::{
    FetchExecutor, FetchedBatch, MailTransport, MemoryTransport, TransportBatch, TransportError,
    spaced_headers,
};
pub use view::{BoundaryFlags, FolderView, GrowOutcome, ViewCapabilities, ViewState, ViewUpdate};
