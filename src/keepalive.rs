//! Keep-alive pulse.
//!
//! Pushes an empty message onto `send` once per period so the outbound
//! session round-trips (and ticks the watchdog) even when the user is idle.
//! The outbound session consumes `send` strictly one message at a time, so
//! the pulse never causes more than one round trip in flight. A [`PulseGate`]
//! keeps at most one pulse waiting in `send`, however long the write socket
//! stays down.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::queues::PulseGate;

/// Run the pulse until `cancel` fires.
///
/// # Errors
///
/// Returns [`SessionError::QueueClosed`] if the outbound end of `send` is gone.
pub async fn run(
    send_tx: UnboundedSender<String>,
    gate: PulseGate,
    period: Duration,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            _ = interval.tick() => {
                if !gate.try_arm() {
                    log::trace!("Previous keep-alive pulse still queued, skipping");
                } else if send_tx.send(String::new()).is_err() {
                    return Err(SessionError::QueueClosed("send"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_pulse_sends_empty_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gate = PulseGate::default();
        let cancel = CancellationToken::new();
        let pulse = tokio::spawn(run(tx, gate.clone(), Duration::from_millis(10), cancel.clone()));

        for _ in 0..3 {
            assert_eq!(rx.recv().await.as_deref(), Some(""));
            gate.disarm();
        }

        cancel.cancel();
        assert!(pulse.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_pulses_do_not_pile_up_while_unconsumed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let pulse = tokio::spawn(run(tx, PulseGate::default(), Duration::from_millis(5), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        assert!(pulse.await.unwrap().is_ok());

        let mut queued = 0;
        while rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, 1);
    }

    #[tokio::test]
    async fn test_pulse_stops_when_queue_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let result = run(
            tx,
            PulseGate::default(),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(SessionError::QueueClosed("send"))));
    }
}
