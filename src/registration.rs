//! Account registration on the write socket.
//!
//! ```text
//! server: greeting line              client: (discard)
//! client: \n\n                       (empty token skips authorization)
//! server: nickname prompt            client: (discard)
//! client: <name>\n\n
//! server: {"nickname": ..., "account_hash": ...}
//! ```

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::credentials::Credentials;
use crate::transport::{LineConnection, TcpLineConnection};

/// Run the registration exchange over an open connection.
pub async fn exchange<R, W>(conn: &mut LineConnection<R, W>, name: &str) -> Result<Credentials>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let greeting = conn.read_line().await?;
    log::debug!("Registration greeting: {:?}", greeting);

    conn.send_line("").await?;

    let prompt = conn.read_line().await?;
    log::debug!("Registration prompt: {:?}", prompt);

    conn.send_line(name).await?;

    let response = conn
        .read_line()
        .await?
        .context("Server did not answer the registration request")?;
    Credentials::from_json(&response)
        .with_context(|| format!("Unexpected registration response {response:?}"))
}

/// Ask for a preferred nickname on `output` and read it from `input`.
pub async fn prompt_nickname<I, O>(mut input: I, mut output: O) -> Result<String>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    output.write_all(b"No account found. Enter preferred nickname: ").await?;
    output.flush().await?;

    let mut name = String::new();
    input
        .read_line(&mut name)
        .await
        .context("Could not read a nickname")?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("A nickname is required to register");
    }
    Ok(name.to_string())
}

/// Register `name` and store the issued credentials at `config.credentials_path`.
pub async fn register(config: &Config, name: &str) -> Result<Credentials> {
    if name.trim().is_empty() {
        anyhow::bail!("A nickname is required to register");
    }

    let mut conn = TcpLineConnection::open(&config.host, config.write_port, config.io_timeout())
        .await
        .with_context(|| format!("Could not connect to {}:{}", config.host, config.write_port))?;
    let creds = exchange(&mut conn, name).await;
    conn.close().await;

    let creds = creds?;
    creds.save(&config.credentials_path)?;
    log::info!(
        "Registered as {}",
        creds.nickname.as_deref().unwrap_or(name)
    );
    Ok(creds)
}
