//! Message types for actor communication.
//!
//! These enums define the protocol between the connection thread and the
//! session that renders its output, plus the JSON wire frame they are
//! decoded from.

use serde::Deserialize;

use crate::error::{Result, TailError};

/// Status content that marks the end of a log stream.
pub const STATUS_FINISHED: &str = "finished";

/// A decoded inbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A chunk of log content. May be empty and may end mid-line.
    Message(String),
    /// A status signal from the server.
    Status(String),
}

/// The JSON object carried by every inbound frame.
#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
}

impl StreamEvent {
    /// Decode one frame payload.
    ///
    /// Returns `Ok(None)` for frame kinds other than `message` and `status`,
    /// which the protocol reserves for future use. A missing or `null`
    /// `content` decodes as the empty string.
    pub fn decode(payload: &str) -> Result<Option<Self>> {
        let frame: Frame = serde_json::from_str(payload)?;
        let content = frame.content.unwrap_or_default();
        Ok(match frame.kind.as_str() {
            "message" => Some(Self::Message(content)),
            "status" => Some(Self::Status(content)),
            _ => None,
        })
    }

    /// Decode a binary frame, which must hold UTF-8 JSON.
    pub fn decode_bytes(payload: &[u8]) -> Result<Option<Self>> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| TailError::Protocol(format!("binary frame is not UTF-8: {e}")))?;
        Self::decode(text)
    }

    /// Whether this is the terminal `finished` status.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Status(status) if status == STATUS_FINISHED)
    }
}

/// Events from the connection thread.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The websocket handshake completed.
    Opened,
    /// A decoded frame.
    Stream(StreamEvent),
    /// The transport failed. Always followed by [`ConnectionEvent::Closed`].
    Error(TailError),
    /// The connection is gone; no further events follow.
    Closed,
}

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Receiving frames.
    Open,
    /// Terminal; a new connection needs a new actor.
    Closed,
}

impl ConnectionState {
    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closed => 2,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}
