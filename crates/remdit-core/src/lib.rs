//! remdit Core Library
//!
//! This crate provides the client side of remdit: upload a local file to a
//! remdit server, get back a shareable edit URL, and keep the local file in
//! sync with every save made in the browser.
//!
//! # Architecture
//!
//! - **Negotiation**: one HTTP upload creates the session
//! - **Transport**: a message channel bound to the session (WebSocket or SSH)
//! - **Sync engine**: applies saves to the local file and acknowledges them
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load(None)?;
//! let server = config.select_server(&[TransportKind::WebSocket])?;
//!
//! let session = HttpNegotiator::new(server.clone()).create_session(path).await?;
//! println!("{}", session.edit_url);
//!
//! let transport = WebSocketTransport::connect(&session).await?;
//! let mut engine = SyncEngine::new(transport, &session.file_path);
//! let outcome = engine.run(shutdown).await;
//! engine.close(&outcome).await?;
//! ```
//!
//! # Modules
//!
//! - `config`: Config file discovery and server selection
//! - `server`: Server descriptors and endpoint URLs
//! - `session`: Session negotiation over HTTP
//! - `sync`: Transports and the sync engine
//! - `error`: Error types

pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod sync;

pub use config::Config;
pub use error::{
    ApplyError, ConfigError, ProtocolError, SessionError, SessionResult, TransportError,
};
pub use server::{ServerDescriptor, TransportKind};
pub use session::{HttpNegotiator, Session};
pub use sync::{CloseCode, SyncEngine, SyncStats, SyncStatus, Transport, WebSocketTransport};
