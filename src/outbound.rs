//! Outbound session: the authenticated write socket.
//!
//! ```text
//! Authenticating ──ok──► Ready ──message round trip──► Ready
//!     │      │                │
//!     │   rejected        I/O error
//!     │      ▼                ▼
//!     │   InvalidToken    Disconnected ──backoff──► Authenticating
//!   I/O error                 ▲
//!     └───────────────────────┘
//! ```
//!
//! In `Ready` the session takes one message at a time from `send`:
//! discard the server prompt, write the line, read the acknowledgement.
//! Delivery is at most once: a message in flight when the socket dies is
//! dropped, not retried.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::constants::SEND_SUCCESS_MARKER;
use crate::error::SessionError;
use crate::handshake::{authorize, Authorization};
use crate::queues::{ConnectionState, Publisher, PulseGate, StatusUpdate, TickSource};
use crate::supervisor::backoff;
use crate::transport::{LineConnection, TcpLineConnection};

/// Connection state of the write socket.
#[derive(Debug)]
enum WriteState {
    /// Waiting out the reconnect backoff.
    Disconnected,
    /// Connecting and running the handshake.
    Authenticating,
    /// Authorized; consuming the `send` queue.
    Ready(TcpLineConnection),
}

/// Server verdict on one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Acknowledgement started with the success marker.
    Accepted,
    /// The server answered with something else.
    Rejected(String),
    /// No acknowledgement arrived within the read timeout.
    Unacknowledged,
}

/// Open the write socket and authorize with `token`.
///
/// # Errors
///
/// Returns [`SessionError::InvalidToken`] when the server rejects the
/// token, any other variant for transient failures.
pub async fn connect_and_authorize(
    config: &Config,
    token: &str,
) -> Result<(TcpLineConnection, Authorization), SessionError> {
    let mut conn = TcpLineConnection::open(&config.host, config.write_port, config.io_timeout()).await?;
    let authorization = authorize(&mut conn, token).await?;
    if !authorization.authorized {
        conn.close().await;
        return Err(SessionError::InvalidToken);
    }
    Ok((conn, authorization))
}

/// One message round trip: prompt, line, acknowledgement.
///
/// # Errors
///
/// Returns [`SessionError::Io`] if the socket fails mid-exchange.
pub async fn exchange<R, W>(conn: &mut LineConnection<R, W>, message: &str) -> Result<Delivery, SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let prompt = conn.read_line().await?;
    log::trace!("Send prompt: {:?}", prompt);

    conn.send_line(message).await?;

    Ok(match conn.read_line().await? {
        Some(ack) if ack.starts_with(SEND_SUCCESS_MARKER) => Delivery::Accepted,
        Some(ack) => Delivery::Rejected(ack),
        None => Delivery::Unacknowledged,
    })
}

/// Run the outbound session until `cancel` fires or the token is rejected.
///
/// # Errors
///
/// Returns [`SessionError::InvalidToken`] for an empty or rejected token,
/// [`SessionError::QueueClosed`] if every `send` producer is gone. All
/// socket failures are absorbed by a reconnect.
pub async fn run(
    config: &Config,
    token: &str,
    publisher: Publisher,
    send_rx: &mut UnboundedReceiver<String>,
    pulse_gate: PulseGate,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    if token.trim().is_empty() {
        return Err(SessionError::InvalidToken);
    }

    let mut state = WriteState::Authenticating;
    loop {
        state = match state {
            WriteState::Disconnected => {
                if backoff(config.reconnect_backoff(), &cancel).await {
                    return Ok(());
                }
                WriteState::Authenticating
            }

            WriteState::Authenticating => {
                publisher.status(StatusUpdate::Send(ConnectionState::Initiated));
                let attempt = tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    attempt = connect_and_authorize(config, token) => attempt,
                };
                match attempt {
                    Ok((conn, authorization)) => {
                        log::info!(
                            "Authorized on {}:{} as {}",
                            config.host,
                            config.write_port,
                            authorization.nickname.as_deref().unwrap_or("<unnamed>")
                        );
                        if let Some(nickname) = authorization.nickname {
                            publisher.status(StatusUpdate::Nickname(nickname));
                        }
                        publisher.status(StatusUpdate::Send(ConnectionState::Established));
                        publisher.tick(TickSource::Authorized);
                        WriteState::Ready(conn)
                    }
                    Err(e) if e.is_fatal() => {
                        log::error!("Authorization rejected: {e}");
                        publisher.status(StatusUpdate::Send(ConnectionState::Closed));
                        return Err(e);
                    }
                    Err(e) => {
                        log::warn!("Write socket authorization failed: {e}");
                        publisher.status(StatusUpdate::Send(ConnectionState::Closed));
                        WriteState::Disconnected
                    }
                }
            }

            WriteState::Ready(mut conn) => {
                let next = tokio::select! {
                    () = cancel.cancelled() => {
                        conn.close().await;
                        return Ok(());
                    }
                    next = send_rx.recv() => next,
                };
                let Some(message) = next else {
                    conn.close().await;
                    return Err(SessionError::QueueClosed("send"));
                };
                if message.is_empty() {
                    pulse_gate.disarm();
                }
                if message.is_empty() && !send_rx.is_empty() {
                    log::trace!("Skipping keep-alive pulse queued behind other messages");
                    state = WriteState::Ready(conn);
                    continue;
                }

                let result = tokio::select! {
                    () = cancel.cancelled() => {
                        conn.close().await;
                        return Ok(());
                    }
                    result = exchange(&mut conn, &message) => result,
                };
                match result {
                    Ok(Delivery::Accepted) => {
                        if !message.is_empty() {
                            log::debug!("Message sent: {message}");
                        }
                        publisher.tick(TickSource::Acknowledged);
                        WriteState::Ready(conn)
                    }
                    Ok(Delivery::Rejected(ack)) => {
                        log::warn!("Server did not confirm message {message:?}: {ack:?}");
                        publisher.tick(TickSource::Acknowledged);
                        WriteState::Ready(conn)
                    }
                    Ok(Delivery::Unacknowledged) => {
                        log::warn!("No acknowledgement for message {message:?}");
                        WriteState::Ready(conn)
                    }
                    Err(e) => {
                        log::warn!("Write socket lost, dropping message {message:?}: {e}");
                        conn.close().await;
                        publisher.status(StatusUpdate::Send(ConnectionState::Closed));
                        WriteState::Disconnected
                    }
                }
            }
        };
    }
}
