//! Authentication handshake on the write socket.
//!
//! ```text
//! server: greeting line          client: (discard)
//! client: <token>\n\n
//! server: {"nickname": ...} | {} | null
//! server: prompt line            client: (discard, only when accepted)
//! ```
//!
//! The response schema is narrow: a JSON object with an optional `nickname`
//! string means "accepted", `null` or `{}` means "rejected". Anything else,
//! JSON or not, is a transient protocol error, never a reason to crash.

use std::io;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::SessionError;
use crate::transport::LineConnection;

/// Outcome of a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// Whether the server accepted the token.
    pub authorized: bool,
    /// Display name the server associated with the token.
    pub nickname: Option<String>,
}

impl Authorization {
    fn rejected() -> Self {
        Self {
            authorized: false,
            nickname: None,
        }
    }
}

/// Interpret the server's response to a token.
///
/// A non-empty object is an acceptance, `null` or `{}` a rejection.
///
/// # Errors
///
/// Returns [`SessionError::Malformed`] when `line` is not JSON or is JSON of
/// any other shape.
pub fn parse_response(line: &str) -> Result<Authorization, SessionError> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| SessionError::Malformed(format!("{e} in {line:?}")))?;

    match value {
        Value::Object(account) if !account.is_empty() => Ok(Authorization {
            authorized: true,
            nickname: account
                .get("nickname")
                .and_then(Value::as_str)
                .map(str::to_owned),
        }),
        Value::Null | Value::Object(_) => Ok(Authorization::rejected()),
        other => {
            log::warn!("Unexpected handshake response shape: {other}");
            Err(SessionError::Malformed(format!("unexpected response {line:?}")))
        }
    }
}

/// Run the handshake over a freshly opened write connection.
///
/// The caller decides what a rejection means; see
/// [`outbound`](crate::outbound) for the fatal path.
///
/// # Errors
///
/// Returns [`SessionError::Io`] on socket failure or when the server never
/// answers the token, [`SessionError::Malformed`] for a non-JSON answer.
pub async fn authorize<R, W>(
    conn: &mut LineConnection<R, W>,
    token: &str,
) -> Result<Authorization, SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let greeting = conn.read_line().await?;
    log::debug!("Handshake greeting: {:?}", greeting);

    conn.send_line(token).await?;

    let Some(response) = conn.read_line().await? else {
        return Err(SessionError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "server did not answer the token",
        )));
    };

    let authorization = parse_response(&response)?;
    if authorization.authorized {
        let prompt = conn.read_line().await?;
        log::debug!("Handshake prompt: {:?}", prompt);
    }
    Ok(authorization)
}
