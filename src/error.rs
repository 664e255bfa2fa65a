//! Error taxonomy shared by every session task.
//!
//! Only two kinds of failure ever cross the supervisor boundary: liveness
//! failures (restart the generation) and authentication failures (terminate
//! the process). [`SessionError::is_fatal`] is the single place that draws
//! that line.

use std::time::Duration;

/// Errors produced by the connection core.
#[derive(Debug)]
pub enum SessionError {
    /// Socket-level failure: DNS, refused/reset connection, EOF, undecodable bytes.
    Io(std::io::Error),
    /// Handshake response was not JSON, or JSON of an unexpected shape.
    Malformed(String),
    /// No activity was observed for the given window.
    WatchdogTimeout(Duration),
    /// Server rejected the token, or no usable token exists.
    InvalidToken,
    /// A core channel lost every peer on its other end.
    QueueClosed(&'static str),
}

impl SessionError {
    /// Whether this error must terminate the process instead of triggering a reconnect.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidToken)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Connection error: {e}"),
            Self::Malformed(msg) => write!(f, "Malformed server response: {msg}"),
            Self::WatchdogTimeout(window) => {
                write!(f, "Connection timed out: no activity for {:.1}s", window.as_secs_f32())
            }
            Self::InvalidToken => write!(f, "Invalid token: check the credentials file or register again"),
            Self::QueueClosed(name) => write!(f, "The {name} queue was closed"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
