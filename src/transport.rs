//! Line framing over a bidirectional byte stream.
//!
//! The chat protocol is plain UTF-8 text: the server terminates each line
//! with a single `\n`, the client terminates each outgoing line with `\n\n`
//! (the server reads until an empty line).
//!
//! # Architecture
//!
//! ```text
//! LineConnection
//!     ├── LineReader  (buffered, read-timeout aware, cancel-safe)
//!     └── LineWriter  (sanitizing, write-timeout aware)
//! ```
//!
//! Both halves are generic over tokio's `AsyncRead`/`AsyncWrite` so the
//! handshake and sessions can be driven by in-memory pipes in tests.
//!
//! # Timeouts
//!
//! Neither half escalates a timeout. A read that times out yields `Ok(None)`;
//! a write that stalls is abandoned and reported as success. Deciding whether
//! silence means death is the watchdog's job, not this layer's.

// Rust guideline compliant 2025-01

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::constants::LINE_TERMINATOR;

/// Remove every line break from outgoing text.
///
/// A stray newline would end the message early on the server side.
pub fn sanitize(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}

/// Encode a message into its wire form: sanitized text plus `\n\n`.
pub fn encode_line(text: &str) -> Vec<u8> {
    let clean = sanitize(text);
    let mut buf = Vec::with_capacity(clean.len() + LINE_TERMINATOR.len());
    buf.extend_from_slice(clean.as_bytes());
    buf.extend_from_slice(LINE_TERMINATOR);
    buf
}

/// Decode one raw line: strict UTF-8, trailing `\r`/`\n` removed.
///
/// # Errors
///
/// Returns `InvalidData` if the bytes are not valid UTF-8.
pub fn decode_line(raw: &[u8]) -> io::Result<String> {
    let text = std::str::from_utf8(raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

/// Read half of a line connection.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: BufReader<R>,
    /// Bytes of a line whose read timed out before the terminator arrived.
    pending: Vec<u8>,
    timeout: Duration,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a reader; every [`read_line`](Self::read_line) waits at most `timeout`.
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
            timeout,
        }
    }

    /// Read the next line.
    ///
    /// Returns `Ok(Some(line))` for a line (possibly empty), `Ok(None)` when
    /// the read timeout fired first. Bytes received before a timeout are kept
    /// and completed by the next call.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` when the peer closed the stream, `InvalidData`
    /// for non-UTF-8 input, or the underlying I/O error.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let read = self.inner.read_until(b'\n', &mut self.pending);
        match tokio::time::timeout(self.timeout, read).await {
            Err(_elapsed) => Ok(None),
            Ok(Err(e)) => Err(e),
            Ok(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )),
            Ok(Ok(_)) => {
                let raw = std::mem::take(&mut self.pending);
                decode_line(&raw).map(Some)
            }
        }
    }
}

/// Write half of a line connection.
#[derive(Debug)]
pub struct LineWriter<W> {
    inner: W,
    timeout: Duration,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// Wrap a writer; every [`send_line`](Self::send_line) waits at most `timeout`.
    pub fn new(inner: W, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Sanitize, terminate and flush one line.
    ///
    /// A write that does not complete within the timeout is abandoned and
    /// reported as `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error (reset, broken pipe).
    pub async fn send_line(&mut self, text: &str) -> io::Result<()> {
        let frame = encode_line(text);
        let timeout = self.timeout;
        let inner = &mut self.inner;
        let write = async move {
            inner.write_all(&frame).await?;
            inner.flush().await
        };
        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result,
            Err(_elapsed) => {
                log::debug!("Write stalled for {:?}, giving up on line", timeout);
                Ok(())
            }
        }
    }

    /// Shut the write direction down.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

/// A reader/writer pair speaking the line protocol.
#[derive(Debug)]
pub struct LineConnection<R, W> {
    /// Incoming lines.
    pub reader: LineReader<R>,
    /// Outgoing lines.
    pub writer: LineWriter<W>,
}

/// Line connection over a TCP socket.
pub type TcpLineConnection = LineConnection<OwnedReadHalf, OwnedWriteHalf>;

impl<R, W> LineConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Build a connection from separate halves sharing one timeout.
    pub fn new(reader: R, writer: W, timeout: Duration) -> Self {
        Self {
            reader: LineReader::new(reader, timeout),
            writer: LineWriter::new(writer, timeout),
        }
    }

    /// See [`LineReader::read_line`].
    ///
    /// # Errors
    ///
    /// Propagates read errors.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.reader.read_line().await
    }

    /// See [`LineWriter::send_line`].
    ///
    /// # Errors
    ///
    /// Propagates write errors.
    pub async fn send_line(&mut self, text: &str) -> io::Result<()> {
        self.writer.send_line(text).await
    }

    /// Shut down the write side and drop the connection.
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            log::debug!("Socket shutdown failed: {e}");
        }
    }
}

impl TcpLineConnection {
    /// Resolve `host` and connect, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the connect did not finish in time, or the
    /// resolver/connect error.
    pub async fn open(host: &str, port: u16, timeout: Duration) -> io::Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|elapsed| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {host}:{port} timed out ({elapsed})"),
                )
            })??;
        let (read_half, write_half) = stream.into_split();
        Ok(Self::new(read_half, write_half, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn test_encode_line_strips_embedded_newlines() {
        assert_eq!(encode_line("hel\nlo\n"), b"hello\n\n".to_vec());
        assert_eq!(encode_line("a\r\nb"), b"ab\n\n".to_vec());
    }

    #[test]
    fn test_encode_empty_line_is_just_terminator() {
        assert_eq!(encode_line(""), b"\n\n".to_vec());
        assert_eq!(encode_line("\n"), b"\n\n".to_vec());
    }

    #[test]
    fn test_decode_line_strips_trailing_terminators_only() {
        assert_eq!(decode_line(b"hello\r\n").unwrap(), "hello");
        assert_eq!(decode_line(b"  spaced  \n").unwrap(), "  spaced  ");
        assert_eq!(decode_line(b"\n").unwrap(), "");
    }

    #[test]
    fn test_decode_line_rejects_invalid_utf8() {
        let err = decode_line(&[0xff, 0xfe, b'\n']).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_read_line_returns_line() {
        let (mut server, client) = duplex(256);
        let mut reader = LineReader::new(client, SHORT);
        server.write_all(b"hello\nworld\n").await.unwrap();

        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn test_read_line_times_out_with_none() {
        let (_server, client) = duplex(256);
        let mut reader = LineReader::new(client, SHORT);
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_line_keeps_partial_line_across_timeout() {
        let (mut server, client) = duplex(256);
        let mut reader = LineReader::new(client, SHORT);

        server.write_all(b"hel").await.unwrap();
        assert_eq!(reader.read_line().await.unwrap(), None);

        server.write_all(b"lo\n").await.unwrap();
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_read_line_eof_is_error() {
        let (server, client) = duplex(256);
        let mut reader = LineReader::new(client, SHORT);
        drop(server);

        let err = reader.read_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_empty_line_is_content_not_timeout() {
        let (mut server, client) = duplex(256);
        let mut reader = LineReader::new(client, SHORT);
        server.write_all(b"\n").await.unwrap();
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_send_line_writes_sanitized_frame() {
        let (client, mut server) = duplex(256);
        let mut writer = LineWriter::new(client, SHORT);
        writer.send_line("multi\nline").await.unwrap();
        drop(writer);

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"multiline\n\n".to_vec());
    }

    #[tokio::test]
    async fn test_send_line_stall_is_not_an_error() {
        // A 4-byte pipe nobody drains cannot take the whole frame.
        let (client, _server) = duplex(4);
        let mut writer = LineWriter::new(client, SHORT);
        assert!(writer.send_line("this will not fit").await.is_ok());
    }

    #[tokio::test]
    async fn test_open_unreachable_port_fails() {
        let result = TcpLineConnection::open("127.0.0.1", 1, SHORT).await;
        assert!(result.is_err());
    }
}
