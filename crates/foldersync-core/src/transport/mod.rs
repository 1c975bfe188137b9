//! Adapter to the mail transport collaborator.
//!
//! The engine never talks to a server directly. It calls a [`MailTransport`]
//! through the [`FetchExecutor`], which validates the response and races it
//! against cancellation.

mod memory;

pub use memory::{MemoryTransport, spaced_headers};

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::{DateRange, FolderId, MessageHeader};
use crate::{Error, Result};

/// Errors reported by a mail transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection failed or was lost.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server refused the request.
    #[error("Server rejected request: {0}")]
    Rejected(String),

    /// The folder does not exist on the server.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),
}

/// A transport's answer to a header fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportBatch {
    /// Headers dated inside the requested range, in any order.
    pub headers: Vec<MessageHeader>,
    /// Total messages in the folder on the server, when reported.
    pub server_total: Option<usize>,
}

/// Remote source of message headers.
///
/// Implementations must be range-filterable and safe to call repeatedly for
/// the same range. Retry and backoff belong to the implementation.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Fetch every header in `folder` dated inside `range`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the request fails.
    async fn fetch_headers(
        &self,
        folder: &FolderId,
        range: &DateRange,
    ) -> std::result::Result<TransportBatch, TransportError>;
}

/// A validated fetch result: sorted newest first, all inside `range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBatch {
    /// The range this batch is the complete listing of.
    pub range: DateRange,
    /// Headers, newest first.
    pub headers: Vec<MessageHeader>,
    /// Total messages in the folder on the server, when reported.
    pub server_total: Option<usize>,
}

/// Single-shot fetch adapter around a [`MailTransport`].
#[derive(Clone)]
pub struct FetchExecutor {
    transport: Arc<dyn MailTransport>,
}

impl std::fmt::Debug for FetchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchExecutor").finish_non_exhaustive()
    }
}

impl FetchExecutor {
    /// Creates an executor over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn MailTransport>) -> Self {
        Self { transport }
    }

    /// Fetch the complete listing of `range`.
    ///
    /// Headers the transport returns outside the range are dropped, since
    /// the batch will be merged as the authoritative listing of `range`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the transport fails, or
    /// [`Error::Cancelled`] if `cancel` fires first. In both cases nothing
    /// of the response is kept.
    pub async fn fetch(
        &self,
        folder: &FolderId,
        range: DateRange,
        cancel: &CancellationToken,
    ) -> Result<FetchedBatch> {
        debug!(%folder, %range, "Fetching headers");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%folder, %range, "Fetch cancelled");
                return Err(Error::Cancelled);
            }
            response = self.transport.fetch_headers(folder, &range) => response,
        };
        let batch = response.inspect_err(|e| warn!(%folder, %range, error = %e, "Fetch failed"))?;

        let received = batch.headers.len();
        let mut headers: Vec<MessageHeader> = batch
            .headers
            .into_iter()
            .filter(|h| range.contains(h.date))
            .collect();
        if headers.len() != received {
            warn!(
                %folder,
                dropped = received - headers.len(),
                "Transport returned headers outside the requested range"
            );
        }
        headers.sort_by_key(MessageHeader::key);

        debug!(%folder, count = headers.len(), total = ?batch.server_total, "Fetched headers");
        Ok(FetchedBatch {
            range,
            headers,
            server_total: batch.server_total,
        })
    }
}
