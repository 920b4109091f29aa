//! Error types
//!
//! Errors are split by who deals with them. [`ConfigError`], [`SessionError`]
//! and [`TransportError`] propagate to the caller and end the session attempt.
//! [`ProtocolError`] and [`ApplyError`] are absorbed by the sync engine: the
//! first is logged and dropped, the second is reported to the peer as a failed
//! save acknowledgement.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used for transport-level failures from different stacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while loading configuration or picking a server
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No config file exists and no default server was compiled in
    #[error("No config file found (searched: {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    /// Failed to read the config file
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML or has the wrong shape
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Config parsed but lists no servers
    #[error("No servers configured")]
    NoServers,

    /// Servers are configured but none is valid for this client
    #[error("No usable servers found ({configured} configured)")]
    NoUsableServers { configured: usize },

    /// Server address cannot be turned into an endpoint URL
    #[error("Invalid server address '{addr}': {details}")]
    InvalidAddress { addr: String, details: String },
}

/// Errors that end a session attempt
#[derive(Error, Debug)]
pub enum SessionError {
    /// No usable server descriptor
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The local document could not be read for upload
    #[error("Failed to read '{path}': {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// DNS, connect or I/O failure talking to the server
    #[error("Network error talking to {addr}: {source}")]
    Network {
        addr: String,
        #[source]
        source: BoxError,
    },

    /// Credentials were rejected
    #[error("Unauthorized by {addr}: check your API key")]
    Auth { addr: String },

    /// Any other non-success negotiation status
    #[error("Server {addr} returned status: {status}")]
    Server { addr: String, status: u16 },

    /// The SSH peer refused a negotiation request
    #[error("Server {addr} rejected '{request}': {message}")]
    Rejected {
        addr: String,
        request: String,
        message: String,
    },

    /// The negotiation response body could not be decoded
    #[error("Failed to decode session response: {0}")]
    Decode(String),

    /// The session channel failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Wrap a transport-level failure with the server address
    pub fn network(addr: impl Into<String>, source: impl Into<BoxError>) -> Self {
        SessionError::Network {
            addr: addr.into(),
            source: source.into(),
        }
    }

    /// Check if the server rejected our credentials
    pub fn is_auth(&self) -> bool {
        matches!(self, SessionError::Auth { .. })
    }

    /// Get a suggestion for the user, if there is an obvious one
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SessionError::Auth { .. } => {
                Some("Check the `key` set for this server in config.toml.")
            }
            SessionError::Network { .. } => {
                Some("Check that the server address is correct and reachable.")
            }
            SessionError::Config(ConfigError::NotFound { .. }) => {
                Some("Create a config.toml with at least one [[servers]] entry.")
            }
            SessionError::LocalFile { .. } => Some("Check that the file exists and is readable."),
            _ => None,
        }
    }
}

/// Fatal failures of an established channel
#[derive(Error, Debug)]
pub enum TransportError {
    /// Peer closed with a code other than normal closure / going away
    #[error("Connection closed by peer ({code}): {reason}")]
    ClosedAbnormally { code: u16, reason: String },

    /// Connection ended without a close signal
    #[error("Connection dropped without a close signal")]
    Disconnected,

    /// WebSocket read/write failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// SSH session failure
    ///
    /// Raised by [`SshSession`](crate::sync::SshSession) implementations;
    /// this crate ships no SSH backend of its own.
    #[error("SSH error: {0}")]
    Ssh(String),

    /// Outbound message could not be serialized
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// A reply was sent with no inbound request waiting for it
    #[error("No pending request to acknowledge")]
    NoPendingRequest,
}

/// Malformed or unrecognized in-session message
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON frame missing `type`, with an unknown `type`, or with bad fields
    #[error("Malformed control message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Peer request of a kind we do not handle
    #[error("Unknown request type '{0}'")]
    UnknownRequest(String),

    /// SSH wire payload that does not decode
    #[error("Malformed payload: {0}")]
    Payload(String),
}

/// Local write failure while applying a save
#[derive(Error, Debug)]
pub enum ApplyError {
    /// Permission denied writing the file
    #[error("Permission denied: cannot write '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Parent directory vanished
    #[error("Cannot write '{path}': directory does not exist")]
    MissingDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error("Disk full or quota exceeded while writing to '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other write failure
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ApplyError {
    /// Classify an I/O error by its kind
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => ApplyError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => ApplyError::MissingDirectory {
                path,
                source: error,
            },
            _ if is_disk_full_error(&error) => ApplyError::DiskFull {
                path,
                source: error,
            },
            _ => ApplyError::Write {
                path,
                source: error,
            },
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
