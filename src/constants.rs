//! Protocol and timing constants for the minechat client.
//!
//! This module centralizes the magic numbers of the chat protocol and the
//! default timing parameters. Every duration here is only a default:
//! [`Config`](crate::config::Config) carries the effective values.
//!
//! # Categories
//!
//! - **Server**: Default endpoints
//! - **Protocol**: Wire markers and framing
//! - **Timeouts**: Transport-level read/write bounds
//! - **Liveness**: Reconnect backoff, watchdog and keep-alive cadence

use std::time::Duration;

// ============================================================================
// Server
// ============================================================================

/// Default chat server host.
pub const DEFAULT_HOST: &str = "minechat.dvmn.org";

/// Default port of the read-only broadcast socket.
pub const DEFAULT_READ_PORT: u16 = 5000;

/// Default port of the authenticated write socket.
pub const DEFAULT_WRITE_PORT: u16 = 5050;

/// Default location of the credentials file.
pub const DEFAULT_CREDENTIALS_PATH: &str = "./credentials.json";

/// Default location of the append-only transcript.
pub const DEFAULT_TRANSCRIPT_PATH: &str = "./chat.log";

// ============================================================================
// Protocol
// ============================================================================

/// Prefix of the acknowledgement the server sends for an accepted message.
pub const SEND_SUCCESS_MARKER: &str = "Message send";

/// Terminator appended to every outgoing line.
///
/// The server treats an empty line as end-of-message, so each write ends
/// with two line feeds.
pub const LINE_TERMINATOR: &[u8] = b"\n\n";

// ============================================================================
// Timeouts
// ============================================================================

/// Upper bound for a single line read, write flush, or connect attempt.
///
/// A read that hits this bound yields "no data" instead of an error.
pub const IO_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Liveness
// ============================================================================

/// Fixed delay before a session or a whole generation reconnects.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Longest silence the watchdog tolerates before forcing a restart.
pub const WATCHDOG_WINDOW: Duration = Duration::from_secs(5);

/// Pause after each consumed activity tick.
///
/// Bounds how fast the watchdog loop can spin under a flood of ticks.
pub const WATCHDOG_PACING: Duration = Duration::from_millis(100);

/// Period of the keep-alive pulse.
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(1);

/// Capacity of the watchdog queue.
///
/// Producers use `try_send`, so a full queue drops ticks instead of
/// stalling network tasks. One pending tick already proves liveness.
pub const WATCHDOG_QUEUE_CAPACITY: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_window_exceeds_keepalive_period() {
        // The pulse must fire several times within one watchdog window,
        // otherwise an idle but healthy connection would be restarted.
        assert!(WATCHDOG_WINDOW > KEEPALIVE_PERIOD * 2);
    }

    #[test]
    fn test_line_terminator_is_two_line_feeds() {
        assert_eq!(LINE_TERMINATOR, b"\n\n");
    }
}
