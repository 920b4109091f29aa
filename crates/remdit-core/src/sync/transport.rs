//! Transport channel abstraction
//!
//! A transport is the message conduit bound to one session. Both realizations
//! (WebSocket/JSON and SSH global requests) expose the same contract so the
//! sync engine is written once.

use async_trait::async_trait;

use super::message::{InboundMessage, OutboundMessage};
use crate::error::{ProtocolError, TransportError};

/// Result of one [`Transport::receive`] call
#[derive(Debug)]
pub enum Incoming {
    /// A well-formed control message
    Message(InboundMessage),
    /// Something arrived but it is not a message we understand
    Invalid(ProtocolError),
    /// Peer closed the channel cleanly
    Closed,
}

/// Close code passed to [`Transport::close`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Session ended normally
    Normal,
    /// Session ended because of an error
    Error,
}

/// Bidirectional, message-oriented channel bound to a session
///
/// Takes `&mut self` everywhere: one caller at a time, so a send always
/// completes before the next send or receive starts.
#[async_trait]
pub trait Transport: Send {
    /// Serialize and write one message
    async fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError>;

    /// Wait for the next message, a clean close, or a fatal error
    async fn receive(&mut self) -> Result<Incoming, TransportError>;

    /// Close the channel; closing twice is a no-op
    async fn close(&mut self, code: CloseCode, reason: &str) -> Result<(), TransportError>;
}
