//! Server descriptors
//!
//! A descriptor names one remdit server: where it lives, which transport it
//! speaks and which credentials to present. The sync core only ever consumes
//! a descriptor that has already been selected from the config.

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Path of the session endpoints, relative to the server base URL
const SESSION_PATH: [&str; 2] = ["api", "session"];

/// How the client talks to a server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// HTTP multipart upload, then a WebSocket with JSON control messages
    #[default]
    #[serde(alias = "ws")]
    WebSocket,
    /// SFTP upload, then SSH global requests
    Ssh,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::WebSocket => write!(f, "websocket"),
            TransportKind::Ssh => write!(f, "ssh"),
        }
    }
}

/// One configured server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Host, host:port or URL
    #[serde(default)]
    pub addr: String,

    /// API key sent as `X-API-Key`
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Password for the SSH transport
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Transport this server expects
    #[serde(default)]
    pub transport: TransportKind,
}

impl ServerDescriptor {
    /// Create a WebSocket descriptor with no credentials
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// A descriptor is usable iff it has an address
    pub fn is_valid(&self) -> bool {
        !self.addr.trim().is_empty()
    }

    /// Base HTTP URL, with `http://` prefixed when the address has no scheme
    pub fn http_base(&self) -> Result<Url, ConfigError> {
        let addr = self.addr.trim();
        let normalized = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };

        Url::parse(&normalized).map_err(|e| self.invalid(e.to_string()))
    }

    /// `POST` target for session negotiation
    pub fn session_endpoint(&self) -> Result<Url, ConfigError> {
        let mut url = self.http_base()?;
        self.append_path(&mut url, &SESSION_PATH)?;
        Ok(url)
    }

    /// WebSocket URL for an established session
    pub fn socket_endpoint(&self, session_id: &str) -> Result<Url, ConfigError> {
        let mut url = self.http_base()?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| self.invalid(format!("cannot use scheme '{}'", scheme)))?;
        self.append_path(&mut url, &[SESSION_PATH[0], SESSION_PATH[1], session_id])?;
        Ok(url)
    }

    fn append_path(&self, url: &mut Url, segments: &[&str]) -> Result<(), ConfigError> {
        url.path_segments_mut()
            .map_err(|_| self.invalid("address cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(())
    }

    fn invalid(&self, details: String) -> ConfigError {
        ConfigError::InvalidAddress {
            addr: self.addr.clone(),
            details,
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
