//! Liveness watchdog.
//!
//! Consumes activity ticks from both sessions. If no tick arrives within
//! the window, it fails with [`SessionError::WatchdogTimeout`], which the
//! supervisor answers by tearing the whole generation down and starting a
//! fresh one. The watchdog never touches a socket itself.

use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::queues::ActivityTick;
use crate::supervisor::backoff;

/// Watch `ticks` until `cancel` fires or the connection goes silent.
///
/// # Errors
///
/// Returns [`SessionError::WatchdogTimeout`] after `window` without a tick.
pub async fn run(
    ticks: &mut Receiver<ActivityTick>,
    window: Duration,
    pacing: Duration,
    cancel: CancellationToken,
) -> Result<(), SessionError> {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            next = tokio::time::timeout(window, ticks.recv()) => next,
        };

        match next {
            Ok(Some(tick)) => log::debug!("Connection is alive ({:?})", tick.source),
            Ok(None) => return Err(SessionError::QueueClosed("watchdog")),
            Err(_elapsed) => {
                log::warn!("No connection activity for {:?}", window);
                return Err(SessionError::WatchdogTimeout(window));
            }
        }

        if backoff(pacing, &cancel).await {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queues::TickSource;
    use tokio::sync::mpsc;

    const WINDOW: Duration = Duration::from_millis(100);
    const PACING: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn test_silence_times_out() {
        let (_tx, mut rx) = mpsc::channel::<ActivityTick>(8);
        let result = run(&mut rx, WINDOW, PACING, CancellationToken::new()).await;
        assert!(matches!(result, Err(SessionError::WatchdogTimeout(w)) if w == WINDOW));
    }

    #[tokio::test]
    async fn test_regular_ticks_keep_it_alive() {
        let (tx, mut rx) = mpsc::channel::<ActivityTick>(8);
        let cancel = CancellationToken::new();

        let feeder = tokio::spawn(async move {
            for _ in 0..10 {
                tx.send(ActivityTick {
                    source: TickSource::InboundLine,
                })
                .await
                .unwrap();
                tokio::time::sleep(WINDOW / 4).await;
            }
            tx
        });

        let stopper = cancel.clone();
        let result = tokio::select! {
            result = run(&mut rx, WINDOW, PACING, cancel) => result,
            tx = feeder => {
                stopper.cancel();
                drop(tx);
                Ok(())
            }
        };
        // The feeder outlived ten quarter-windows without a timeout.
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_returns_ok() {
        let (_tx, mut rx) = mpsc::channel::<ActivityTick>(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(run(&mut rx, WINDOW, PACING, cancel).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_queue_is_error() {
        let (tx, mut rx) = mpsc::channel::<ActivityTick>(8);
        drop(tx);
        let result = run(&mut rx, WINDOW, PACING, CancellationToken::new()).await;
        assert!(matches!(result, Err(SessionError::QueueClosed("watchdog"))));
    }
}
