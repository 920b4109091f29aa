//! Session negotiation
//!
//! A session is the server-side registration of one local document. The HTTP
//! negotiator uploads the document as multipart form data and gets back the
//! session id plus the edit URL to hand to the user. The SSH variant lives in
//! [`crate::sync::ssh`] because its negotiation runs over the same connection
//! as the sync channel.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::server::ServerDescriptor;

/// Header carrying the API key on every HTTP/WebSocket request
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Multipart field holding the uploaded document
const DOCUMENT_FIELD: &str = "document";

/// A negotiated editing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque session identifier
    pub id: String,
    /// URL to share with whoever edits the document
    pub edit_url: String,
    /// Absolute path of the local document
    pub file_path: PathBuf,
    /// Server the session lives on
    pub server: ServerDescriptor,
}

impl Session {
    /// Basename of the local document
    pub fn file_name(&self) -> String {
        file_name(&self.file_path)
    }
}

/// Response body of `POST /api/session`
#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(rename = "sessionid")]
    session_id: String,
    #[serde(rename = "editurl")]
    edit_url: String,
}

/// Creates sessions over HTTP
pub struct HttpNegotiator {
    client: reqwest::Client,
    server: ServerDescriptor,
}

impl HttpNegotiator {
    /// Create a negotiator for one server
    pub fn new(server: ServerDescriptor) -> Self {
        Self::with_client(reqwest::Client::new(), server)
    }

    /// Use a preconfigured HTTP client (timeouts, proxies)
    pub fn with_client(client: reqwest::Client, server: ServerDescriptor) -> Self {
        Self { client, server }
    }

    pub fn server(&self) -> &ServerDescriptor {
        &self.server
    }

    /// Upload the document and register a session for it
    ///
    /// Does not touch the local file beyond reading it.
    pub async fn create_session(&self, file_path: &Path) -> SessionResult<Session> {
        let endpoint = self.server.session_endpoint()?;

        let content = tokio::fs::read(file_path)
            .await
            .map_err(|source| SessionError::LocalFile {
                path: file_path.to_path_buf(),
                source,
            })?;

        debug!(
            "Creating session at {} for {} ({} bytes)",
            endpoint,
            file_path.display(),
            content.len()
        );

        let part = Part::bytes(content).file_name(file_name(file_path));
        let form = Form::new().part(DOCUMENT_FIELD, part);

        let mut request = self.client.post(endpoint.clone()).multipart(form);
        if let Some(ref key) = self.server.key {
            request = request.header(API_KEY_HEADER, key);
        }

        let addr = endpoint.to_string();
        let response = request
            .send()
            .await
            .map_err(|e| SessionError::network(&addr, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SessionError::Auth { addr });
        }
        if !status.is_success() {
            return Err(SessionError::Server {
                addr,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SessionError::network(&addr, e))?;
        let decoded: SessionResponse =
            serde_json::from_slice(&body).map_err(|e| SessionError::Decode(e.to_string()))?;

        debug!("Session {} created", decoded.session_id);

        Ok(Session {
            id: decoded.session_id,
            edit_url: decoded.edit_url,
            file_path: file_path.to_path_buf(),
            server: self.server.clone(),
        })
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// A request as seen by [`serve_once`]
    pub struct CapturedRequest {
        pub head: String,
        pub body: Vec<u8>,
    }

    impl CapturedRequest {
        pub fn header(&self, name: &str) -> Option<String> {
            self.head.lines().find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim().to_string())
            })
        }
    }

    /// Answer exactly one HTTP request with a canned status and body
    pub async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<CapturedRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let captured = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            captured
        });

        (addr, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let mut request = CapturedRequest {
            head,
            body: buf[head_end..].to_vec(),
        };

        let length: usize = request
            .header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        while request.body.len() < length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.body.extend_from_slice(&chunk[..n]);
        }

        request
    }

    /// Negotiator that ignores any proxy configured in the environment
    pub fn negotiator(server: ServerDescriptor) -> HttpNegotiator {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpNegotiator::with_client(client, server)
    }

    fn write_notes(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        path
    }

    #[tokio::test]
    async fn test_create_session_returns_edit_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_notes(&dir);
        let (addr, server) =
            serve_once("200 OK", r#"{"sessionid":"abc123","editurl":"http://host/e/abc123"}"#)
                .await;

        let negotiator = negotiator(ServerDescriptor::new(addr).with_key("secret"));
        let session = negotiator.create_session(&path).await.unwrap();

        assert_eq!(session.id, "abc123");
        assert_eq!(session.edit_url, "http://host/e/abc123");
        assert_eq!(session.file_name(), "notes.txt");

        let request = server.await.unwrap();
        assert!(request.head.starts_with("POST /api/session HTTP/1.1"));
        assert_eq!(request.header("x-api-key").as_deref(), Some("secret"));
        assert!(request
            .header("content-type")
            .unwrap()
            .starts_with("multipart/form-data"));

        let body = String::from_utf8_lossy(&request.body);
        assert!(body.contains(r#"name="document""#));
        assert!(body.contains(r#"filename="notes.txt""#));
        assert!(body.contains("hello"));

        // Negotiation never modifies the local file
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_no_key_header_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_notes(&dir);
        let (addr, server) =
            serve_once("200 OK", r#"{"sessionid":"s","editurl":"http://host/e/s"}"#).await;

        negotiator(ServerDescriptor::new(addr))
            .create_session(&path)
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.header("x-api-key").is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_notes(&dir);
        let (addr, _server) = serve_once("401 Unauthorized", "").await;

        let err = negotiator(ServerDescriptor::new(addr))
            .create_session(&path)
            .await
            .unwrap_err();

        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_internal_error_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_notes(&dir);
        let (addr, _server) = serve_once("500 Internal Server Error", "").await;

        let err = negotiator(ServerDescriptor::new(addr))
            .create_session(&path)
            .await
            .unwrap_err();

        assert!(!err.is_auth());
        assert!(matches!(err, SessionError::Server { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_notes(&dir);
        let (addr, _server) = serve_once("200 OK", r#"{"sessionid":42}"#).await;

        let err = negotiator(ServerDescriptor::new(addr))
            .create_session(&path)
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Decode(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_notes(&dir);

        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = negotiator(ServerDescriptor::new(addr))
            .create_session(&path)
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Network { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_local_file_error() {
        let err = negotiator(ServerDescriptor::new("127.0.0.1:1"))
            .create_session(Path::new("/nonexistent/notes.txt"))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::LocalFile { .. }));
    }
}
