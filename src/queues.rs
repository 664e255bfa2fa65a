//! Channels between the network core and its consumers.
//!
//! Four queues are the only synchronization points in the client:
//!
//! ```text
//!                      receive (String)
//!   Inbound Session ───────────────────────────► presenter
//!                      status (StatusUpdate)
//!   both sessions   ───────────────────────────► presenter
//!                      send (String)
//!   presenter, pulse ──────────────────────────► Outbound Session
//!                      watchdog (ActivityTick)
//!   both sessions   ───────────────────────────► Watchdog
//! ```
//!
//! `receive`, `status` and `send` are unbounded so a slow presenter never
//! stalls socket I/O. `watchdog` is bounded but written with `try_send`:
//! a full queue drops the tick instead of applying backpressure.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::constants::WATCHDOG_QUEUE_CAPACITY;

/// Connection state of one socket direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connect attempt in progress.
    Initiated,
    /// Connected (and, for the write socket, authorized).
    Established,
    /// Torn down; a reconnect will follow.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiated => write!(f, "connecting"),
            Self::Established => write!(f, "established"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Event published on the `status` queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// State change of the read (broadcast) socket.
    Read(ConnectionState),
    /// State change of the write (authenticated) socket.
    Send(ConnectionState),
    /// Display name returned by the server after authorization.
    Nickname(String),
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(state) => write!(f, "[read: {state}]"),
            Self::Send(state) => write!(f, "[send: {state}]"),
            Self::Nickname(name) => write!(f, "[nickname: {name}]"),
        }
    }
}

/// What produced an activity tick. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSource {
    /// A broadcast line arrived on the read socket.
    InboundLine,
    /// The write socket completed authorization.
    Authorized,
    /// The server answered an outgoing message.
    Acknowledged,
}

/// Liveness signal consumed by the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityTick {
    /// Producer of the tick.
    pub source: TickSource,
}

/// Producer side of `receive`, `status` and `watchdog`, shared by the sessions.
///
/// Every method is non-blocking. Publishing to a consumer that is gone is
/// not an error: the supervisor notices shutdown through cancellation.
#[derive(Debug, Clone)]
pub struct Publisher {
    receive_tx: UnboundedSender<String>,
    status_tx: UnboundedSender<StatusUpdate>,
    watchdog_tx: mpsc::Sender<ActivityTick>,
}

impl Publisher {
    /// Push a chat line to the presenter.
    pub fn deliver(&self, line: String) {
        if self.receive_tx.send(line).is_err() {
            log::debug!("Receive queue closed, dropping line");
        }
    }

    /// Publish a status change.
    pub fn status(&self, update: StatusUpdate) {
        if self.status_tx.send(update).is_err() {
            log::debug!("Status queue closed, dropping update");
        }
    }

    /// Best-effort liveness signal.
    pub fn tick(&self, source: TickSource) {
        match self.watchdog_tx.try_send(ActivityTick { source }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::trace!("Watchdog queue full, dropping {:?} tick", source);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("Watchdog queue closed, dropping {:?} tick", source);
            }
        }
    }
}

/// At most one keep-alive pulse waiting in `send`.
///
/// The pulse arms the gate when it queues an empty message and skips its
/// tick while the gate is armed. The outbound session disarms it when it
/// takes an empty message off the queue.
#[derive(Debug, Clone, Default)]
pub struct PulseGate(Arc<AtomicBool>);

impl PulseGate {
    /// Claim the single pulse slot. Returns `false` if a pulse is already queued.
    pub fn try_arm(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the slot after a pulse left the queue.
    pub fn disarm(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Queue ends owned by the session supervisor.
#[derive(Debug)]
pub struct SessionQueues {
    /// Producer handle cloned into each session.
    pub publisher: Publisher,
    /// Sender cloned into the keep-alive pulse.
    pub send_tx: UnboundedSender<String>,
    /// Shared by the pulse and the outbound session.
    pub pulse_gate: PulseGate,
    /// Consumed by the outbound session, one message at a time.
    pub send_rx: UnboundedReceiver<String>,
    /// Consumed by the watchdog.
    pub watchdog_rx: mpsc::Receiver<ActivityTick>,
}

/// Queue ends handed to the presenter.
#[derive(Debug)]
pub struct PresenterQueues {
    /// Chat lines, in socket order.
    pub receive_rx: UnboundedReceiver<String>,
    /// Outgoing user messages.
    pub send_tx: UnboundedSender<String>,
    /// Connection-state and nickname events.
    pub status_rx: UnboundedReceiver<StatusUpdate>,
}

/// Create the four queues and split them between core and presenter.
pub fn channels() -> (SessionQueues, PresenterQueues) {
    let (receive_tx, receive_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let (send_tx, send_rx) = mpsc::unbounded_channel();
    let (watchdog_tx, watchdog_rx) = mpsc::channel(WATCHDOG_QUEUE_CAPACITY);

    let session = SessionQueues {
        publisher: Publisher {
            receive_tx,
            status_tx,
            watchdog_tx,
        },
        send_tx: send_tx.clone(),
        pulse_gate: PulseGate::default(),
        send_rx,
        watchdog_rx,
    };
    let presenter = PresenterQueues {
        receive_rx,
        send_tx,
        status_rx,
    };
    (session, presenter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(
            StatusUpdate::Read(ConnectionState::Established).to_string(),
            "[read: established]"
        );
        assert_eq!(
            StatusUpdate::Send(ConnectionState::Initiated).to_string(),
            "[send: connecting]"
        );
        assert_eq!(StatusUpdate::Nickname("bob".into()).to_string(), "[nickname: bob]");
    }

    #[tokio::test]
    async fn test_presenter_send_reaches_session() {
        let (mut session, presenter) = channels();
        presenter.send_tx.send("hi".to_string()).unwrap();
        assert_eq!(session.send_rx.recv().await.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_publisher_routes_to_presenter() {
        let (session, mut presenter) = channels();
        session.publisher.deliver("hello".to_string());
        session.publisher.status(StatusUpdate::Nickname("bob".into()));

        assert_eq!(presenter.receive_rx.recv().await.as_deref(), Some("hello"));
        assert_eq!(
            presenter.status_rx.recv().await,
            Some(StatusUpdate::Nickname("bob".into()))
        );
    }

    #[test]
    fn test_tick_never_blocks_when_watchdog_is_full() {
        let (mut session, _presenter) = channels();
        for _ in 0..WATCHDOG_QUEUE_CAPACITY * 3 {
            session.publisher.tick(TickSource::InboundLine);
        }

        let mut drained = 0;
        while session.watchdog_rx.try_recv().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, WATCHDOG_QUEUE_CAPACITY);
    }

    #[test]
    fn test_pulse_gate_admits_one_pulse_until_disarmed() {
        let gate = PulseGate::default();
        let shared = gate.clone();

        assert!(gate.try_arm());
        assert!(!shared.try_arm());

        shared.disarm();
        assert!(gate.try_arm());
    }

    #[test]
    fn test_publishing_to_dropped_presenter_is_silent() {
        let (session, presenter) = channels();
        drop(presenter);
        session.publisher.deliver("lost".to_string());
        session.publisher.status(StatusUpdate::Read(ConnectionState::Closed));
    }
}
