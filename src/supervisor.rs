//! Session supervisor: the only restart policy in the client.
//!
//! A *generation* is one concurrent run of the four core tasks:
//!
//! ```text
//! Supervisor
//!     └── generation N (try_join!, cancel-together)
//!         ├── inbound::run    read socket  → receive, watchdog
//!         ├── outbound::run   send queue   → write socket, watchdog
//!         ├── keepalive::run  timer        → send queue
//!         └── watchdog::run   watchdog     → WatchdogTimeout
//! ```
//!
//! When any member fails, `try_join!` drops its siblings at their current
//! suspension point, which closes their sockets. The supervisor then
//! publishes `Closed` for both directions, waits the backoff and starts
//! generation N+1 with new sockets and a new handshake. An invalid token is
//! the one failure that is passed up instead of retried.

// Rust guideline compliant 2025-01

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::SessionError;
use crate::queues::{ConnectionState, SessionQueues, StatusUpdate};
use crate::{inbound, keepalive, outbound, watchdog};

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `true` if cancelled.
pub(crate) async fn backoff(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = cancel.cancelled() => true,
        () = tokio::time::sleep(delay) => false,
    }
}

/// Runs and restarts generations of the connection core.
#[derive(Debug)]
pub struct Supervisor {
    config: Config,
    token: String,
}

impl Supervisor {
    /// Create a supervisor for one account.
    pub fn new(config: Config, token: impl Into<String>) -> Self {
        Self {
            config,
            token: token.into(),
        }
    }

    /// Run generations until `cancel` fires.
    ///
    /// Returns `Ok(())` only after cancellation, once every task of the
    /// current generation has exited.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidToken`] when the server rejects the
    /// token. Every other failure is retried indefinitely.
    pub async fn run(&self, queues: &mut SessionQueues, cancel: &CancellationToken) -> Result<(), SessionError> {
        let mut generation: u64 = 0;

        loop {
            generation += 1;
            // Ticks left over from the previous generation prove nothing.
            while queues.watchdog_rx.try_recv().is_ok() {}

            log::info!("Starting connection generation {generation}");
            let outcome = self.run_generation(queues, cancel.child_token()).await;
            Self::publish_closed(queues);

            match outcome {
                Ok(()) => {
                    log::info!("Generation {generation} stopped on shutdown");
                    return Ok(());
                }
                Err(e) if e.is_fatal() => {
                    log::error!("Generation {generation} aborted: {e}");
                    return Err(e);
                }
                Err(e) => {
                    log::warn!(
                        "Generation {generation} failed: {e}; restarting in {:?}",
                        self.config.reconnect_backoff()
                    );
                }
            }

            if backoff(self.config.reconnect_backoff(), cancel).await {
                log::info!("Shutdown during restart backoff");
                return Ok(());
            }
        }
    }

    async fn run_generation(&self, queues: &mut SessionQueues, cancel: CancellationToken) -> Result<(), SessionError> {
        let SessionQueues {
            publisher,
            send_tx,
            pulse_gate,
            send_rx,
            watchdog_rx,
        } = queues;

        tokio::try_join!(
            inbound::run(&self.config, publisher.clone(), cancel.clone()),
            outbound::run(
                &self.config,
                &self.token,
                publisher.clone(),
                send_rx,
                pulse_gate.clone(),
                cancel.clone(),
            ),
            keepalive::run(
                send_tx.clone(),
                pulse_gate.clone(),
                self.config.keepalive_period(),
                cancel.clone(),
            ),
            watchdog::run(
                watchdog_rx,
                self.config.watchdog_window(),
                self.config.watchdog_pacing(),
                cancel,
            ),
        )?;
        Ok(())
    }

    fn publish_closed(queues: &SessionQueues) {
        queues
            .publisher
            .status(StatusUpdate::Read(ConnectionState::Closed));
        queues
            .publisher
            .status(StatusUpdate::Send(ConnectionState::Closed));
    }
}
