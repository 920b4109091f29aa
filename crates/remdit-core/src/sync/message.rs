//! Control message types
//!
//! Messages exchanged with the remdit server once a session is open. Inbound
//! frames are decoded in one step into a tagged enum, so a frame with a
//! missing or unknown `type`, or with missing/mistyped fields for its type,
//! fails as a single [`ProtocolError`] instead of half-way through handling.

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Reason sent after the local file was written
pub const SAVE_OK_REASON: &str = "file saved successfully";

/// Reason sent after the local write failed
pub const SAVE_FAILED_REASON: &str = "failed to save file";

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Replace the whole local file with `content`
    Save { content: Vec<u8> },
}

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// Acknowledgement of a save
    #[serde(rename = "save_result")]
    SaveResult { success: bool, reason: String },
}

/// JSON shape of inbound WebSocket frames
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireInbound {
    #[serde(rename = "save")]
    Save { content: String },
}

impl InboundMessage {
    /// Decode a JSON control frame
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let wire: WireInbound = serde_json::from_slice(bytes).map_err(ProtocolError::Malformed)?;

        Ok(match wire {
            WireInbound::Save { content } => InboundMessage::Save {
                content: content.into_bytes(),
            },
        })
    }
}

impl OutboundMessage {
    /// Acknowledge a successful save
    pub fn saved() -> Self {
        OutboundMessage::SaveResult {
            success: true,
            reason: SAVE_OK_REASON.to_string(),
        }
    }

    /// Report a failed save
    pub fn save_failed() -> Self {
        OutboundMessage::SaveResult {
            success: false,
            reason: SAVE_FAILED_REASON.to_string(),
        }
    }

    /// Encode message as a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Reply to the SSH `file-info` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub file_id: String,
    pub edit_url: String,
}

impl FileInfo {
    /// Decode the reply payload: two SSH `string`s, FileID then EditUrl
    pub fn decode(mut payload: &[u8]) -> Result<Self, ProtocolError> {
        let file_id = read_ssh_string(&mut payload)?;
        let edit_url = read_ssh_string(&mut payload)?;

        if payload.has_remaining() {
            return Err(ProtocolError::Payload(format!(
                "{} trailing bytes after file info",
                payload.remaining()
            )));
        }

        Ok(Self { file_id, edit_url })
    }

    /// Encode in the same layout [`FileInfo::decode`] reads
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.file_id.len() + self.edit_url.len());
        write_ssh_string(&mut out, &self.file_id);
        write_ssh_string(&mut out, &self.edit_url);
        out
    }
}

impl std::fmt::Display for FileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileID: {}, EditUrl: {}", self.file_id, self.edit_url)
    }
}

fn read_ssh_string(buf: &mut &[u8]) -> Result<String, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::Payload("truncated string length".to_string()));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::Payload(format!(
            "string of {} bytes but only {} remain",
            len,
            buf.remaining()
        )));
    }

    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec())
        .map_err(|e| ProtocolError::Payload(format!("string is not UTF-8: {}", e)))
}

fn write_ssh_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}
