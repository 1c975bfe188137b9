//! View edges anchored to index keys.
//!
//! A view stores keys rather than positions, so inserts and removals made
//! through other views shift its positions without moving its edges.

use crate::index::MessageIndex;
use crate::model::IndexKey;
use crate::planner::Window;

/// Newer edge of a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TopBound {
    /// Follows the newest indexed message.
    Newest,
    /// Starts at this message (or the first one ordered after it).
    At(IndexKey),
    /// Starts just past this message. Used for an empty view parked below
    /// the last indexed message.
    After(IndexKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bounds {
    top: TopBound,
    /// Last visible message; `None` for an empty view.
    bottom: Option<IndexKey>,
}

impl Bounds {
    /// An empty view at the top of the folder.
    pub(crate) const fn empty() -> Self {
        Self {
            top: TopBound::Newest,
            bottom: None,
        }
    }

    /// Current positions of the view in `index`.
    pub(crate) fn resolve(&self, index: &MessageIndex) -> Window {
        let start = match &self.top {
            TopBound::Newest => 0,
            TopBound::At(key) => index.lower_bound(key),
            TopBound::After(key) => index.upper_bound(key),
        };
        let end = self
            .bottom
            .as_ref()
            .map_or(start, |key| index.upper_bound(key))
            .max(start);
        Window { start, end }
    }

    /// Anchors `window` to the keys currently at its edges.
    pub(crate) fn anchor(index: &MessageIndex, window: Window) -> Self {
        let top = if window.start == 0 {
            TopBound::Newest
        } else if let Some(first) = index.get(window.start) {
            TopBound::At(first.key())
        } else {
            index
                .get(window.start - 1)
                .map_or(TopBound::Newest, |above| TopBound::After(above.key()))
        };
        let bottom = if window.is_empty() {
            None
        } else {
            index.get(window.end - 1).map(|last| last.key())
        };
        Self { top, bottom }
    }
}
