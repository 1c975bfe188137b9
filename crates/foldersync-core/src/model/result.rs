//! Classification counts reported to consumers.

use serde::{Deserialize, Serialize};

/// Outcome counts of a view operation.
///
/// `total_visible` is always the view's size after the operation; the other
/// counts are non-zero only when the operation merged fetched headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Messages visible in the view after the operation.
    pub total_visible: usize,
    /// Headers that were not in the index before.
    pub fully_new: usize,
    /// Previously known headers whose flag state was re-delivered.
    pub flags_updated: usize,
    /// Known headers removed because the server no longer reports them.
    pub deleted_removed: usize,
    /// Headers skipped because they conflict with an existing record.
    pub conflicts: usize,
}

impl SyncResult {
    /// A result that only reports the visible count.
    #[must_use]
    pub const fn visible(total_visible: usize) -> Self {
        Self {
            total_visible,
            fully_new: 0,
            flags_updated: 0,
            deleted_removed: 0,
            conflicts: 0,
        }
    }

    /// Whether the operation changed nothing in the index.
    #[must_use]
    pub const fn is_zero_delta(&self) -> bool {
        self.fully_new == 0 && self.flags_updated == 0 && self.deleted_removed == 0
    }
}
