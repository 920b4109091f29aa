//! WebSocket transport
//!
//! JSON control messages over a WebSocket bound to one session.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::error::ProtocolError as WsProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::message::{InboundMessage, OutboundMessage};
use super::transport::{CloseCode, Incoming, Transport};
use crate::error::{SessionError, SessionResult, TransportError};
use crate::session::{Session, API_KEY_HEADER};

/// Transport speaking JSON over a WebSocket
pub struct WebSocketTransport<S = MaybeTlsStream<TcpStream>> {
    stream: WebSocketStream<S>,
    /// Peer sent a Close frame; tungstenite has queued the reply
    peer_closed: bool,
    closed: bool,
}

impl WebSocketTransport {
    /// Dial the session's WebSocket endpoint
    pub async fn connect(session: &Session) -> SessionResult<Self> {
        let url = session.server.socket_endpoint(&session.id)?;
        let addr = url.to_string();
        debug!("Connecting to {}", addr);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SessionError::network(&addr, e))?;
        if let Some(ref key) = session.server.key {
            let value = HeaderValue::from_str(key).map_err(|e| SessionError::network(&addr, e))?;
            request.headers_mut().insert(API_KEY_HEADER, value);
        }

        let (stream, _response) = connect_async(request).await.map_err(|e| match e {
            WsError::Http(ref response) if response.status() == StatusCode::UNAUTHORIZED => {
                SessionError::Auth { addr: addr.clone() }
            }
            WsError::Http(ref response) => SessionError::Server {
                addr: addr.clone(),
                status: response.status().as_u16(),
            },
            e => SessionError::network(&addr, e),
        })?;

        debug!("Connected to {}", addr);
        Ok(Self::from_stream(stream))
    }
}

impl<S> WebSocketTransport<S> {
    /// Wrap an already-upgraded stream
    pub fn from_stream(stream: WebSocketStream<S>) -> Self {
        Self {
            stream,
            peer_closed: false,
            closed: false,
        }
    }
}

#[async_trait]
impl<S> Transport for WebSocketTransport<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        let text = message.to_json()?;
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Incoming, TransportError> {
        loop {
            // Pings are answered by tungstenite on the next read/write
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(decode(text.as_bytes()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(decode(&data));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    self.peer_closed = true;
                    return match frame {
                        Some(CloseFrame {
                            code: WsCloseCode::Normal | WsCloseCode::Away,
                            reason,
                        }) => {
                            debug!("Peer closed the session: {}", reason);
                            Ok(Incoming::Closed)
                        }
                        Some(CloseFrame { code, reason }) => {
                            warn!("Peer closed the session with {}: {}", code, reason);
                            Err(TransportError::ClosedAbnormally {
                                code: code.into(),
                                reason: reason.into_owned(),
                            })
                        }
                        None => Err(TransportError::ClosedAbnormally {
                            code: WsCloseCode::Status.into(),
                            reason: "no close status".to_string(),
                        }),
                    };
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::Disconnected),
            }
        }
    }

    async fn close(&mut self, code: CloseCode, reason: &str) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.peer_closed {
            // Only the queued close reply is left to write
            return match self.stream.flush().await {
                Ok(()) => Ok(()),
                Err(e) if is_already_closed(&e) => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        let frame = CloseFrame {
            code: match code {
                CloseCode::Normal => WsCloseCode::Normal,
                CloseCode::Error => WsCloseCode::Error,
            },
            reason: close_reason(reason).to_string().into(),
        };

        match self.stream.close(Some(frame)).await {
            Ok(()) => Ok(()),
            Err(e) if is_already_closed(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_already_closed(error: &WsError) -> bool {
    matches!(
        error,
        WsError::ConnectionClosed
            | WsError::AlreadyClosed
            | WsError::Protocol(WsProtocolError::SendAfterClosing)
    )
}

/// Close reasons share the 125-byte control frame with the 2-byte code
const MAX_CLOSE_REASON: usize = 123;

fn close_reason(reason: &str) -> &str {
    if reason.len() <= MAX_CLOSE_REASON {
        return reason;
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

fn decode(bytes: &[u8]) -> Incoming {
    match InboundMessage::from_json(bytes) {
        Ok(message) => Incoming::Message(message),
        Err(e) => Incoming::Invalid(e),
    }
}
