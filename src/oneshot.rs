//! One-shot authenticated send.
//!
//! Connects, authorizes, delivers a single message and disconnects. Shares
//! the handshake and the round trip with the long-running outbound session
//! but involves no queues, watchdog or reconnects.

use crate::config::Config;
use crate::error::SessionError;
use crate::outbound::{connect_and_authorize, exchange, Delivery};

/// Send `message` once.
///
/// # Errors
///
/// Returns [`SessionError::InvalidToken`] for a rejected token, any other
/// variant if the connection fails before the message is written.
pub async fn send_message(config: &Config, token: &str, message: &str) -> Result<Delivery, SessionError> {
    if token.trim().is_empty() {
        return Err(SessionError::InvalidToken);
    }

    let (mut conn, authorization) = connect_and_authorize(config, token).await?;
    log::info!(
        "Authorized as {}",
        authorization.nickname.as_deref().unwrap_or("<unnamed>")
    );

    let delivery = exchange(&mut conn, message).await;
    conn.close().await;

    match &delivery {
        Ok(Delivery::Accepted) => log::info!("Message sent"),
        Ok(Delivery::Rejected(ack)) => log::error!("Message not sent: {ack}"),
        Ok(Delivery::Unacknowledged) => log::error!("Message not confirmed by server"),
        Err(e) => log::error!("Message not sent: {e}"),
    }
    delivery
}
