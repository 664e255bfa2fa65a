//! Inbound session: the read-only broadcast socket.
//!
//! ```text
//! Connecting ──ok──► Streaming ──line──► Streaming
//!     │                  │
//!   error           error / EOF
//!     ▼                  ▼
//! Disconnected ◄─────────┘
//!     │
//!  backoff ──► Connecting
//! ```
//!
//! Each received line goes to `receive`, produces an activity tick and is
//! appended to the transcript. The loop never ends on its own; it only
//! returns when the generation is cancelled.

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::SessionError;
use crate::queues::{ConnectionState, Publisher, StatusUpdate, TickSource};
use crate::supervisor::backoff;
use crate::transcript::Transcript;
use crate::transport::TcpLineConnection;

/// Connection state of the read socket.
#[derive(Debug)]
enum ReadState {
    /// Waiting out the reconnect backoff.
    Disconnected,
    /// Opening the socket.
    Connecting,
    /// Reading lines.
    Streaming(TcpLineConnection),
}

/// Run the inbound session until `cancel` fires.
///
/// Never returns an error: every socket failure is absorbed by a
/// reconnect. The `Result` keeps the signature uniform with the other
/// members of a generation.
pub async fn run(
    config: &Config,
    publisher: Publisher,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    let mut transcript = match Transcript::open(&config.transcript_path, config.timestamp_transcript).await {
        Ok(transcript) => Some(transcript),
        Err(e) => {
            log::warn!(
                "Transcript {} unavailable, continuing without it: {e}",
                config.transcript_path.display()
            );
            None
        }
    };

    let mut state = ReadState::Connecting;
    loop {
        state = match state {
            ReadState::Disconnected => {
                if backoff(config.reconnect_backoff(), &cancel).await {
                    return Ok(());
                }
                ReadState::Connecting
            }

            ReadState::Connecting => {
                publisher.status(StatusUpdate::Read(ConnectionState::Initiated));
                let opened = tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    opened = TcpLineConnection::open(&config.host, config.read_port, config.io_timeout()) => opened,
                };
                match opened {
                    Ok(conn) => {
                        log::info!("Read socket connected to {}:{}", config.host, config.read_port);
                        publisher.status(StatusUpdate::Read(ConnectionState::Established));
                        ReadState::Streaming(conn)
                    }
                    Err(e) => {
                        log::warn!("Read socket connect to {}:{} failed: {e}", config.host, config.read_port);
                        publisher.status(StatusUpdate::Read(ConnectionState::Closed));
                        ReadState::Disconnected
                    }
                }
            }

            ReadState::Streaming(mut conn) => {
                let read = tokio::select! {
                    () = cancel.cancelled() => {
                        conn.close().await;
                        return Ok(());
                    }
                    read = conn.read_line() => read,
                };
                match read {
                    Ok(Some(line)) => {
                        log::debug!("Received: {line}");
                        publisher.deliver(line.clone());
                        publisher.tick(TickSource::InboundLine);
                        if let Some(sink) = transcript.as_mut() {
                            if let Err(e) = sink.append(&line).await {
                                log::warn!("Failed to append to {}: {e}", sink.path().display());
                            }
                        }
                        ReadState::Streaming(conn)
                    }
                    // Silence is the watchdog's concern.
                    Ok(None) => ReadState::Streaming(conn),
                    Err(e) => {
                        log::warn!("Read socket lost: {e}");
                        conn.close().await;
                        publisher.status(StatusUpdate::Read(ConnectionState::Closed));
                        ReadState::Disconnected
                    }
                }
            }
        };
    }
}
