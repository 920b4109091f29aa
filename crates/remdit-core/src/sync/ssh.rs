//! SSH transport
//!
//! On SSH servers the document is pushed over SFTP, the session info is
//! fetched with a `file-info` global request, and after a `listen` request
//! the server drives the session by sending global requests of its own
//! (`file-save`), each answered with an accept/reject reply.
//!
//! The SSH connection itself is behind [`SshSession`]. Implementations
//! authenticate as [`client_user`] with an ephemeral key pair plus the
//! descriptor's password and do not verify the host key.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::message::{FileInfo, InboundMessage, OutboundMessage, SAVE_FAILED_REASON};
use super::transport::{CloseCode, Incoming, Transport};
use crate::error::{ProtocolError, SessionError, SessionResult, TransportError};
use crate::server::ServerDescriptor;
use crate::session::{file_name, Session};

/// Request for the uploaded file's id and edit URL
pub const FILE_INFO_REQUEST: &str = "file-info";

/// Request that starts the server's request feed
pub const LISTEN_REQUEST: &str = "listen";

/// Server request carrying the new file content
pub const FILE_SAVE_REQUEST: &str = "file-save";

/// Reply message for request types we do not handle
pub const UNKNOWN_REQUEST_REASON: &str = "unknown request type";

/// User name presented to the SSH server
pub fn client_user() -> String {
    format!(
        "remdit-rs-{}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Reply to a global request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestReply {
    pub accepted: bool,
    pub payload: Vec<u8>,
}

/// Global request initiated by the server
#[derive(Debug)]
pub struct PeerRequest {
    pub kind: String,
    pub payload: Vec<u8>,
    reply: Option<oneshot::Sender<RequestReply>>,
}

impl PeerRequest {
    /// Create a request; the receiver yields the reply when one was wanted
    pub fn new(
        kind: impl Into<String>,
        payload: Vec<u8>,
        want_reply: bool,
    ) -> (Self, Option<oneshot::Receiver<RequestReply>>) {
        let (tx, rx) = if want_reply {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        (
            Self {
                kind: kind.into(),
                payload,
                reply: tx,
            },
            rx,
        )
    }

    pub fn wants_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Answer the request; a no-op when no reply was wanted
    pub fn reply(self, accepted: bool, message: &str) {
        if let Some(tx) = self.reply {
            let _ = tx.send(RequestReply {
                accepted,
                payload: message.as_bytes().to_vec(),
            });
        }
    }
}

/// An authenticated SSH connection
#[async_trait]
pub trait SshSession: Send {
    /// Create `remote_name` in the server's default SFTP directory
    async fn upload(&mut self, remote_name: &str, content: &[u8]) -> Result<(), TransportError>;

    /// Send a global request and wait for the reply
    async fn request(
        &mut self,
        kind: &str,
        want_reply: bool,
        payload: &[u8],
    ) -> Result<RequestReply, TransportError>;

    /// Next server-initiated global request; `None` once the connection is gone
    async fn next_request(&mut self) -> Option<PeerRequest>;

    /// Tear down the connection
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Upload the document and fetch the session info
pub async fn create_session<S: SshSession>(
    ssh: &mut S,
    server: &ServerDescriptor,
    file_path: &Path,
) -> SessionResult<Session> {
    let content = tokio::fs::read(file_path)
        .await
        .map_err(|source| SessionError::LocalFile {
            path: file_path.to_path_buf(),
            source,
        })?;

    let remote_name = file_name(file_path);
    debug!("Uploading {} ({} bytes) over SFTP", remote_name, content.len());
    ssh.upload(&remote_name, &content)
        .await
        .map_err(|e| SessionError::network(&server.addr, e))?;

    let reply = ssh
        .request(FILE_INFO_REQUEST, true, &[])
        .await
        .map_err(|e| SessionError::network(&server.addr, e))?;
    if !reply.accepted {
        return Err(rejected(server, FILE_INFO_REQUEST, &reply));
    }

    let info = FileInfo::decode(&reply.payload).map_err(|e| SessionError::Decode(e.to_string()))?;
    debug!("Uploaded file info: {}", info);

    Ok(Session {
        id: info.file_id,
        edit_url: info.edit_url,
        file_path: file_path.to_path_buf(),
        server: server.clone(),
    })
}

fn rejected(server: &ServerDescriptor, request: &str, reply: &RequestReply) -> SessionError {
    SessionError::Rejected {
        addr: server.addr.clone(),
        request: request.to_string(),
        message: String::from_utf8_lossy(&reply.payload).into_owned(),
    }
}

/// Transport over SSH global requests
pub struct SshTransport<S> {
    session: S,
    /// `file-save` request waiting for its `save_result`
    pending: Option<PeerRequest>,
    closed: bool,
}

impl<S: SshSession> SshTransport<S> {
    /// Ask the server to start sending requests
    pub async fn listen(mut session: S, server: &ServerDescriptor) -> SessionResult<Self> {
        let reply = session
            .request(LISTEN_REQUEST, true, &[])
            .await
            .map_err(|e| SessionError::network(&server.addr, e))?;
        if !reply.accepted {
            return Err(rejected(server, LISTEN_REQUEST, &reply));
        }

        Ok(Self {
            session,
            pending: None,
            closed: false,
        })
    }

    pub fn into_session(self) -> S {
        self.session
    }
}

#[async_trait]
impl<S: SshSession> Transport for SshTransport<S> {
    async fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        let OutboundMessage::SaveResult { success, reason } = message;
        let request = self
            .pending
            .take()
            .ok_or(TransportError::NoPendingRequest)?;
        request.reply(success, &reason);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Incoming, TransportError> {
        if let Some(stale) = self.pending.take() {
            warn!("Save request left unanswered, rejecting it");
            stale.reply(false, SAVE_FAILED_REASON);
        }

        let Some(mut request) = self.session.next_request().await else {
            debug!("Server request feed ended");
            return Ok(Incoming::Closed);
        };

        if request.kind == FILE_SAVE_REQUEST {
            let content = std::mem::take(&mut request.payload);
            self.pending = Some(request);
            return Ok(Incoming::Message(InboundMessage::Save { content }));
        }

        let kind = request.kind.clone();
        request.reply(false, UNKNOWN_REQUEST_REASON);
        Ok(Incoming::Invalid(ProtocolError::UnknownRequest(kind)))
    }

    async fn close(&mut self, code: CloseCode, reason: &str) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        debug!("Closing SSH session ({:?}): {}", code, reason);
        if let Some(request) = self.pending.take() {
            request.reply(false, SAVE_FAILED_REASON);
        }
        self.session.disconnect().await
    }
}
