//! Persisted folder snapshot.

use serde::{Deserialize, Serialize};

use crate::model::{DateRange, FolderId, MessageHeader};

/// Everything committed for one folder, encoded as a JSON blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSnapshot {
    /// Snapshot format version.
    pub version: u32,
    /// Folder identity.
    pub folder: FolderId,
    /// Known headers, newest first.
    pub headers: Vec<MessageHeader>,
    /// Covered ranges, oldest first.
    pub coverage: Vec<DateRange>,
    /// Message total last reported by the server.
    #[serde(default)]
    pub server_total: Option<usize>,
    /// Whether coverage reached the oldest-date floor.
    #[serde(default)]
    pub floor_reached: bool,
    /// Whether the oldest end of the folder was confirmed by an empty fetch.
    #[serde(default)]
    pub oldest_confirmed: bool,
}

impl FolderSnapshot {
    /// Version written by this build.
    pub const CURRENT_VERSION: u32 = 1;
}
