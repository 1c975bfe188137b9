//! In-memory mail server used by tests and the demo binary.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{MailTransport, TransportBatch, TransportError};
use crate::model::{DateRange, FolderId, Flags, MessageHeader};

#[derive(Debug, Default)]
struct ServerState {
    folders: HashMap<FolderId, Vec<MessageHeader>>,
    /// Errors keyed by the request number they answer.
    failures: BTreeMap<usize, TransportError>,
    requests: Vec<(FolderId, DateRange)>,
    latency: Option<StdDuration>,
}

/// A fake server holding folders of headers.
///
/// Mutations take effect on the next fetch. Failures can be scheduled for
/// any upcoming request.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<ServerState>,
}

impl MemoryTransport {
    /// Creates a server with no folders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds messages to a folder, creating it if needed.
    pub fn insert(&self, folder: &FolderId, headers: impl IntoIterator<Item = MessageHeader>) {
        self.lock()
            .folders
            .entry(folder.clone())
            .or_default()
            .extend(headers);
    }

    /// Expunges a message. Returns whether it existed.
    pub fn remove(&self, folder: &FolderId, id: &str) -> bool {
        let mut state = self.lock();
        let Some(messages) = state.folders.get_mut(folder) else {
            return false;
        };
        let before = messages.len();
        messages.retain(|h| h.id.as_str() != id);
        messages.len() != before
    }

    /// Replaces a message's flags. Returns whether it existed.
    pub fn set_flags(&self, folder: &FolderId, id: &str, flags: Flags) -> bool {
        let mut state = self.lock();
        let message = state
            .folders
            .get_mut(folder)
            .and_then(|messages| messages.iter_mut().find(|h| h.id.as_str() == id));
        match message {
            Some(header) => {
                header.flags = flags;
                true
            }
            None => false,
        }
    }

    /// Makes the next fetch fail with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.fail_nth(0, error);
    }

    /// Makes the fetch `n` requests from now (0 is the next one) fail.
    pub fn fail_nth(&self, n: usize, error: TransportError) {
        let mut state = self.lock();
        let request = state.requests.len() + n;
        state.failures.insert(request, error);
    }

    /// Delays every fetch by `latency`.
    pub fn set_latency(&self, latency: Option<StdDuration>) {
        self.lock().latency = latency;
    }

    /// Number of fetches served so far, failed ones included.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Every range requested so far, oldest request first.
    #[must_use]
    pub fn requests(&self) -> Vec<(FolderId, DateRange)> {
        self.lock().requests.clone()
    }

    /// Number of messages the server holds in `folder`.
    #[must_use]
    pub fn message_count(&self, folder: &FolderId) -> usize {
        self.lock().folders.get(folder).map_or(0, Vec::len)
    }
}

#[async_trait]
impl MailTransport for MemoryTransport {
    async fn fetch_headers(
        &self,
        folder: &FolderId,
        range: &DateRange,
    ) -> Result<TransportBatch, TransportError> {
        let (request, latency) = {
            let mut state = self.lock();
            state.requests.push((folder.clone(), *range));
            (state.requests.len() - 1, state.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        if let Some(error) = state.failures.remove(&request) {
            return Err(error);
        }
        let messages = state.folders.get(folder).map_or(&[][..], Vec::as_slice);
        Ok(TransportBatch {
            headers: messages
                .iter()
                .filter(|h| range.contains(h.date))
                .cloned()
                .collect(),
            server_total: Some(messages.len()),
        })
    }
}

/// Builds `count` headers, the newest dated `newest` and each following one
/// `spacing` older. Ids run `msg-0` (newest) upwards.
#[must_use]
pub fn spaced_headers(count: usize, newest: DateTime<Utc>, spacing: Duration) -> Vec<MessageHeader> {
    let mut date = newest;
    (0..count)
        .map(|i| {
            let header = MessageHeader::new(format!("msg-{i}"), date)
                .with_subject(format!("Message {i}"))
                .with_from("sender@example.com");
            date -= spacing;
            header
        })
        .collect()
}
