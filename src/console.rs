//! Line-oriented console presenter used by the binary.
//!
//! Stands in for a real UI: chat lines and status events go to the output,
//! every input line is queued for sending. End of input requests shutdown.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::queues::PresenterQueues;

/// Drive the presenter side of the queues until `cancel` fires or input ends.
pub async fn run<I, O>(queues: PresenterQueues, input: I, mut output: O, cancel: CancellationToken)
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let PresenterQueues {
        mut receive_rx,
        send_tx,
        mut status_rx,
    } = queues;
    let mut input = input.lines();

    loop {
        let shown = tokio::select! {
            () = cancel.cancelled() => break,
            Some(line) = receive_rx.recv() => line,
            Some(update) = status_rx.recv() => update.to_string(),
            typed = input.next_line() => {
                match typed {
                    Ok(Some(text)) if text.trim().is_empty() => {}
                    Ok(Some(text)) => {
                        if send_tx.send(text).is_err() {
                            log::warn!("Send queue closed");
                            break;
                        }
                    }
                    Ok(None) => {
                        log::info!("Input closed, shutting down");
                        cancel.cancel();
                        break;
                    }
                    Err(e) => {
                        log::warn!("Failed to read input: {e}");
                        cancel.cancel();
                        break;
                    }
                }
                continue;
            }
        };

        if let Err(e) = write_line(&mut output, &shown).await {
            log::warn!("Failed to write output: {e}");
            cancel.cancel();
            break;
        }
    }
}

async fn write_line<O: AsyncWrite + Unpin>(output: &mut O, line: &str) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
