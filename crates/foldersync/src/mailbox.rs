//! Mailbox fixtures served by the in-memory transport.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use foldersync_core::{FolderId, MemoryTransport, MessageHeader, spaced_headers};
use serde::Deserialize;

/// Folders and their messages, as stored in a JSON fixture.
#[derive(Debug, Default, Deserialize)]
pub struct Mailbox {
    pub folders: BTreeMap<String, Vec<MessageHeader>>,
}

impl Mailbox {
    /// Reads a JSON fixture.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading mailbox {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing mailbox {}", path.display()))
    }

    /// An `INBOX` of `count` messages, one every `spacing`, the newest at `now`.
    pub fn synthetic(now: DateTime<Utc>, count: usize, spacing: Duration) -> Self {
        let mut folders = BTreeMap::new();
        folders.insert("INBOX".to_string(), spaced_headers(count, now, spacing));
        Self { folders }
    }

    pub fn message_count(&self) -> usize {
        self.folders.values().map(Vec::len).sum()
    }

    /// Loads every folder into a fresh in-memory server.
    pub fn into_transport(self) -> MemoryTransport {
        let transport = MemoryTransport::new();
        for (folder, headers) in self.folders {
            transport.insert(&FolderId::new(folder), headers);
        }
        transport
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_fixture_parses() {
        let mailbox: Mailbox =
            serde_json::from_str(include_str!("../fixtures/mailbox.json")).unwrap();
        assert!(mailbox.folders.contains_key("INBOX"));
        assert!(mailbox.message_count() > 0);

        let transport = mailbox.into_transport();
        assert!(transport.message_count(&FolderId::new("INBOX")) > 0);
    }

    #[test]
    fn test_synthetic_inbox() {
        let now = Utc::now();
        let mailbox = Mailbox::synthetic(now, 46, Duration::minutes(684));
        assert_eq!(mailbox.message_count(), 46);
    }
}
