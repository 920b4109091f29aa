//! Sync engine
//!
//! Runs the receive/apply/acknowledge loop on top of a [`Transport`]:
//!
//! ```text
//! Listening --save--> Applying --save_result--> Listening
//!     |
//!     +-- clean close / cancelled --> ClosedClean
//!     +-- any other receive error --> ClosedError
//! ```
//!
//! Only one receive is outstanding at a time, so saves are applied strictly
//! in order and never race each other on the local file.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::message::{InboundMessage, OutboundMessage};
use super::transport::{CloseCode, Incoming, Transport};
use crate::error::{ApplyError, TransportError};

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Waiting for the next message
    Listening,
    /// Writing a save to the local file
    Applying,
    /// Peer closed cleanly or the session was cancelled
    ClosedClean,
    /// The channel failed
    ClosedError,
}

/// Counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub saves_applied: u64,
    pub saves_failed: u64,
    pub messages_discarded: u64,
}

/// Keeps one local file in sync with the remote session
pub struct SyncEngine<T> {
    transport: T,
    file_path: PathBuf,
    status: watch::Sender<SyncStatus>,
    status_rx: watch::Receiver<SyncStatus>,
    stats: SyncStats,
}

impl<T: Transport> SyncEngine<T> {
    /// Create an engine owning `transport` and writing to `file_path`
    pub fn new(transport: T, file_path: impl Into<PathBuf>) -> Self {
        let (status, status_rx) = watch::channel(SyncStatus::Listening);
        Self {
            transport,
            file_path: file_path.into(),
            status,
            status_rx,
            stats: SyncStats::default(),
        }
    }

    /// Get the current status
    pub fn status(&self) -> SyncStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status changes
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Process messages until the peer closes, `shutdown` resolves, or the
    /// channel fails
    ///
    /// A clean close and cancellation both return `Ok`. On `Err` the caller
    /// should still [`close`](Self::close) the transport.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.set_status(SyncStatus::Listening);

            let received = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                received = self.transport.receive() => Some(received),
            };

            let Some(received) = received else {
                info!("Session cancelled, stopping listener");
                self.set_status(SyncStatus::ClosedClean);
                return Ok(());
            };

            match received {
                Ok(Incoming::Message(InboundMessage::Save { content })) => {
                    if let Err(e) = self.apply_save(content).await {
                        self.set_status(SyncStatus::ClosedError);
                        return Err(e);
                    }
                }
                Ok(Incoming::Invalid(e)) => {
                    warn!("Discarding message: {}", e);
                    self.stats.messages_discarded += 1;
                }
                Ok(Incoming::Closed) => {
                    info!("Server closed the session");
                    self.set_status(SyncStatus::ClosedClean);
                    return Ok(());
                }
                Err(e) => {
                    self.set_status(SyncStatus::ClosedError);
                    return Err(e);
                }
            }
        }
    }

    /// Close the transport according to how [`run`](Self::run) ended
    pub async fn close(
        &mut self,
        outcome: &Result<(), TransportError>,
    ) -> Result<(), TransportError> {
        match outcome {
            Ok(()) => {
                self.transport
                    .close(CloseCode::Normal, "session ended")
                    .await
            }
            Err(e) => self.transport.close(CloseCode::Error, &e.to_string()).await,
        }
    }

    /// Overwrite the local file and acknowledge
    async fn apply_save(&mut self, content: Vec<u8>) -> Result<(), TransportError> {
        self.set_status(SyncStatus::Applying);

        let reply = match write_document(&self.file_path, &content).await {
            Ok(()) => {
                info!("File saved with {} bytes", content.len());
                self.stats.saves_applied += 1;
                OutboundMessage::saved()
            }
            Err(e) => {
                error!("Failed to write file: {}", e);
                self.stats.saves_failed += 1;
                OutboundMessage::save_failed()
            }
        };

        self.transport.send(reply).await
    }

    fn set_status(&self, status: SyncStatus) {
        if self.status.send_replace(status) != status {
            debug!("Sync status: {:?}", status);
        }
    }
}

/// Replace the whole file with `content`
async fn write_document(path: &Path, content: &[u8]) -> Result<(), ApplyError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ApplyError::from_io(e, path.to_path_buf()))
}
