//! Live sync with the remdit server
//!
//! Once a session is open the server pushes the full document on every save
//! and expects exactly one acknowledgement per save:
//!
//! 1. Server sends `{"type":"save","content":"..."}`
//! 2. Client overwrites the local file
//! 3. Client replies `{"type":"save_result","success":...,"reason":"..."}`
//!
//! The same exchange runs over a WebSocket ([`WebSocketTransport`]) or over
//! SSH global requests ([`SshTransport`]). [`SyncEngine`] only sees the
//! [`Transport`] trait.
//!
//! ## Usage
//!
//! ```ignore
//! let transport = WebSocketTransport::connect(&session).await?;
//! let mut engine = SyncEngine::new(transport, &session.file_path);
//! let outcome = engine.run(async { tokio::signal::ctrl_c().await.ok(); }).await;
//! engine.close(&outcome).await?;
//! ```

mod engine;
mod message;
pub mod ssh;
mod transport;
mod websocket;

pub use engine::{SyncEngine, SyncStats, SyncStatus};
pub use message::{FileInfo, InboundMessage, OutboundMessage, SAVE_FAILED_REASON, SAVE_OK_REASON};
pub use ssh::{SshSession, SshTransport};
pub use transport::{CloseCode, Incoming, Transport};
pub use websocket::WebSocketTransport;
