//! Domain-specific error types for the framecast pipeline.
//!
//! All fallible operations return `Result<T, StreamError>`. Every error
//! raised while streaming is fatal to the session: the lifecycle moves to
//! `Closing` and releases the connection, it never retries.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for framecast.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Pipeline Errors ──────────────────────────────────────────
    /// The capture region or device could not be read.
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// The raw frame was malformed or the image codec failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// The payload does not fit in the 4-byte length prefix.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A received frame exceeded the receiver's configured limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The remote endpoint actively refused the connection.
    #[error("connection refused by {addr}: {source}")]
    ConnectionRefused {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The host name could not be resolved to an address.
    #[error("cannot resolve {host}: {source}")]
    Dns {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The byte stream failed. Always terminal for the connection.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    // ── Application Errors ───────────────────────────────────────
    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A state transition or call sequence violated the lifecycle.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),
}

impl StreamError {
    /// Short, stable name of the error kind for status lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CaptureUnavailable(_) => "CaptureUnavailable",
            Self::Encode(_) => "EncodeError",
            Self::PayloadTooLarge { .. } => "PayloadTooLarge",
            Self::FrameTooLarge { .. } => "FrameTooLarge",
            Self::ConnectionRefused { .. } => "ConnectionRefused",
            Self::Timeout(_) => "Timeout",
            Self::Dns { .. } => "DNSError",
            Self::Transport(_) => "TransportError",
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::ProtocolViolation(_) => "ProtocolViolation",
        }
    }

    /// Whether the error originated in the byte stream rather than in
    /// capture or encoding.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::ConnectionRefused { .. }
                | Self::Timeout(_)
                | Self::Dns { .. }
        )
    }

    pub(crate) fn transport(kind: std::io::ErrorKind, msg: impl Into<String>) -> Self {
        Self::Transport(std::io::Error::new(kind, msg.into()))
    }
}

impl From<image::ImageError> for StreamError {
    fn from(e: image::ImageError) -> Self {
        StreamError::Encode(e.to_string())
    }
}
