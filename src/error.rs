//! Error types for the log tailer.
//!
//! None of these are fatal to the host: connection and protocol failures are
//! reported as diagnostics and never interrupt rendering.

use thiserror::Error;

/// Errors that can occur while tailing a log.
#[derive(Error, Debug)]
pub enum TailError {
    /// The transport failed to establish or failed while open.
    #[error("Connection error: {0}")]
    Connection(String),

    /// An inbound frame could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration (bad address, duplicate log id, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error from a sink or a seed source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tungstenite::Error> for TailError {
    fn from(err: tungstenite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for TailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<url::ParseError> for TailError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid address: {err}"))
    }
}

/// Result type for tailer operations.
pub type Result<T> = std::result::Result<T, TailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TailError::Connection("refused".to_string());
        assert_eq!(err.to_string(), "Connection error: refused");

        let err = TailError::Config("duplicate log id `a`".to_string());
        assert_eq!(err.to_string(), "Configuration error: duplicate log id `a`");
    }

    #[test]
    fn test_error_conversion() {
        let err: TailError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, TailError::Protocol(_)));

        let err: TailError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, TailError::Config(_)));
    }
}
