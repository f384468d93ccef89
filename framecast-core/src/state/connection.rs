//! Stream lifecycle state machine.
//!
//! Models the client session with validated transitions that return
//! `Result` instead of panicking.

use std::time::Instant;

use crate::error::StreamError;

// ── StreamState ──────────────────────────────────────────────────

/// The current phase of a streaming session.
///
/// ```text
///  Disconnected ──► Connected ──► Streaming ──► Closing ──► Closed
///                       │                          ▲
///                       └──────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    /// No connection yet. Initial state.
    #[default]
    Disconnected,

    /// TCP link is up; the capture loop has not started.
    Connected {
        /// When the connection was established.
        since: Instant,
    },

    /// Inside the capture loop.
    Streaming {
        /// When the first cycle started.
        since: Instant,
    },

    /// Releasing the connection after a stop request or a fatal error.
    Closing,

    /// Connection released. Terminal.
    Closed,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Streaming { .. } => write!(f, "Streaming"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

impl StreamState {
    /// Returns `true` while a live connection is owned.
    pub fn has_connection(&self) -> bool {
        matches!(self, Self::Connected { .. } | Self::Streaming { .. })
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// How long the session has been streaming.
    ///
    /// Returns `None` for any other phase.
    pub fn streaming_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Streaming { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connected`.
    ///
    /// Valid from: `Disconnected`.
    pub fn connected(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(StreamError::ProtocolViolation(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Streaming`.
    ///
    /// Valid from: `Connected`.
    pub fn begin_streaming(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Connected { .. } => {
                *self = Self::Streaming {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(StreamError::ProtocolViolation(
                "cannot stream: not in Connected state",
            )),
        }
    }

    /// Transition to `Closing`.
    ///
    /// Valid from: `Connected`, `Streaming`.
    pub fn begin_close(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Connected { .. } | Self::Streaming { .. } => {
                *self = Self::Closing;
                Ok(())
            }
            _ => Err(StreamError::ProtocolViolation(
                "cannot close: no live connection",
            )),
        }
    }

    /// Transition to `Closed`.
    ///
    /// Valid from: `Closing`.
    pub fn finish_close(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Closing => {
                *self = Self::Closed;
                Ok(())
            }
            _ => Err(StreamError::ProtocolViolation(
                "cannot finish close: not in Closing state",
            )),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut state = StreamState::default();
        assert_eq!(state, StreamState::Disconnected);

        state.connected().unwrap();
        assert!(state.has_connection());

        state.begin_streaming().unwrap();
        assert!(state.is_streaming());
        assert!(state.streaming_duration().is_some());

        state.begin_close().unwrap();
        assert_eq!(state, StreamState::Closing);
        assert!(!state.has_connection());

        state.finish_close().unwrap();
        assert!(state.is_closed());
    }

    #[test]
    fn close_before_streaming() {
        let mut state = StreamState::default();
        state.connected().unwrap();
        state.begin_close().unwrap();
        state.finish_close().unwrap();
        assert!(state.is_closed());
    }

    #[test]
    fn closed_is_terminal() {
        let mut state = StreamState::Closed;
        assert!(state.connected().is_err());
        assert!(state.begin_streaming().is_err());
        assert!(state.begin_close().is_err());
        assert!(state.finish_close().is_err());
    }

    #[test]
    fn invalid_transitions() {
        let mut state = StreamState::Disconnected;
        assert!(state.begin_streaming().is_err());
        assert!(state.begin_close().is_err());

        let mut state = StreamState::Streaming {
            since: Instant::now(),
        };
        assert!(state.connected().is_err());
        assert!(state.finish_close().is_err());
    }

    #[test]
    fn display_format() {
        assert_eq!(StreamState::Disconnected.to_string(), "Disconnected");
        assert_eq!(
            StreamState::Connected {
                since: Instant::now()
            }
            .to_string(),
            "Connected"
        );
        assert_eq!(
            StreamState::Streaming {
                since: Instant::now()
            }
            .to_string(),
            "Streaming"
        );
        assert_eq!(StreamState::Closing.to_string(), "Closing");
        assert_eq!(StreamState::Closed.to_string(), "Closed");
    }
}
