//! Runtime configuration shared by sessions and the registry.

use std::time::Duration;

use crate::actor::ReconnectPolicy;

/// How chunks are split into lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineMode {
    /// Every chunk is split on its own. A line the transport fragments
    /// across two chunks renders as two numbered lines.
    #[default]
    PerChunk,
    /// Text after the last newline is held back until a later chunk
    /// completes it, and flushed when the stream ends.
    Buffered,
}

/// Configuration for a tailing session.
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Line splitting behavior.
    pub line_mode: LineMode,
    /// Capacity of the connection → renderer event channel.
    ///
    /// The connection thread stops reading from the socket while the
    /// channel is full.
    pub channel_capacity: usize,
    /// Socket read timeout; bounds how long `close()` takes to be noticed.
    pub read_timeout: Duration,
    /// Bound for the TCP connect and for the websocket handshake.
    pub handshake_timeout: Duration,
    /// Reconnection policy applied by the registry.
    pub reconnect: ReconnectPolicy,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            line_mode: LineMode::PerChunk,
            channel_capacity: 64,
            read_timeout: Duration::from_millis(50),
            handshake_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
