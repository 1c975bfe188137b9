//! Message headers and their ordering key.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MessageId;

/// The set of flags (system flags and keywords) on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(BTreeSet<String>);

impl Flags {
    /// Seen flag.
    pub const SEEN: &'static str = "\\Seen";
    /// Flagged (starred) flag.
    pub const FLAGGED: &'static str = "\\Flagged";
    /// Answered flag.
    pub const ANSWERED: &'static str = "\\Answered";

    /// Creates an empty flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a flag. Returns true if it was not already set.
    pub fn insert(&mut self, flag: impl Into<String>) -> bool {
        self.0.insert(flag.into())
    }

    /// Removes a flag. Returns true if it was set.
    pub fn remove(&mut self, flag: &str) -> bool {
        self.0.remove(flag)
    }

    /// Whether the flag is set.
    #[must_use]
    pub fn contains(&self, flag: &str) -> bool {
        self.0.contains(flag)
    }

    /// Whether the message has been read.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.contains(Self::SEEN)
    }

    /// Iterates the flags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of flags set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no flags are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Flags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Header of one message as held in the local index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Stable identity.
    pub id: MessageId,
    /// Message date (internal date on the server).
    pub date: DateTime<Utc>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    /// Sender address.
    #[serde(default)]
    pub from: String,
    /// Current flags.
    #[serde(default)]
    pub flags: Flags,
    /// Tombstone marker: the server reports the message as deleted but not
    /// yet expunged.
    #[serde(default)]
    pub deleted: bool,
}

impl MessageHeader {
    /// Creates a header with no flags.
    #[must_use]
    pub fn new(id: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::new(id),
            date,
            subject: String::new(),
            from: String::new(),
            flags: Flags::new(),
            deleted: false,
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the sender.
    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Sets the flags.
    #[must_use]
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Position of this header in the index ordering.
    #[must_use]
    pub fn key(&self) -> IndexKey {
        IndexKey {
            date: self.date,
            id: self.id.clone(),
        }
    }

    /// Whether `other` describes the same message (identity, date, envelope).
    ///
    /// Flags and the deleted marker are mutable and not compared.
    #[must_use]
    pub fn same_message(&self, other: &Self) -> bool {
        self.id == other.id
            && self.date == other.date
            && self.subject == other.subject
            && self.from == other.from
    }

    /// Whether the mutable state differs from `other`.
    #[must_use]
    pub fn state_differs(&self, other: &Self) -> bool {
        self.flags != other.flags || self.deleted != other.deleted
    }
}

/// Sort key of the message index: newest first, identity breaks ties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    /// Message date.
    pub date: DateTime<Utc>,
    /// Message identity.
    pub id: MessageId,
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .date
            .cmp(&self.date)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_newer_sorts_first() {
        let older = MessageHeader::new("a", Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let newer = MessageHeader::new("b", Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap());
        assert!(newer.key() < older.key());
    }

    #[test]
    fn test_same_date_orders_by_id() {
        let date = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let a = MessageHeader::new("a", date);
        let b = MessageHeader::new("b", date);
        assert!(a.key() < b.key());
    }

    #[test]
    fn test_flags_do_not_affect_identity() {
        let date = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let plain = MessageHeader::new("a", date).with_subject("Hi");
        let seen = plain
            .clone()
            .with_flags([Flags::SEEN].into_iter().collect());
        assert!(plain.same_message(&seen));
        assert!(plain.state_differs(&seen));
    }
}
