//! Domain model types shared by every sync component.

mod header;
mod identifiers;
mod range;
mod result;

pub use header::{Flags, IndexKey, MessageHeader};
pub use identifiers::{AccountId, FolderId, MessageId};
pub use range::DateRange;
pub use result::SyncResult;
