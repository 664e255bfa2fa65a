//! Append-only transcript of received chat lines.
//!
//! The inbound session is the single writer; nothing else opens the file
//! for writing, so no locking is involved. At startup the presenter's
//! history is rebuilt by replaying the file into the `receive` queue.

use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::queues::Publisher;

/// Format a line with a `[dd.mm.YYYY HH:MM]` prefix.
pub fn stamp<Tz>(line: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("[{}] {line}\n", at.format("%d.%m.%Y %H:%M"))
}

/// Append handle for the transcript file.
#[derive(Debug)]
pub struct Transcript {
    file: File,
    path: PathBuf,
    timestamps: bool,
}

impl Transcript {
    /// Open (creating if needed) the transcript for appending.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be opened.
    pub async fn open(path: &Path, timestamps: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            timestamps,
        })
    }

    /// Append one received line.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the write fails.
    pub async fn append(&mut self, line: &str) -> io::Result<()> {
        let entry = if self.timestamps {
            stamp(line, &Local::now())
        } else {
            format!("{line}\n")
        };
        self.file.write_all(entry.as_bytes()).await?;
        self.file.flush().await
    }

    /// Location of the transcript.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replay a transcript into the `receive` queue.
///
/// A missing file is an empty history. Returns the number of lines replayed.
///
/// # Errors
///
/// Returns the I/O error for anything other than a missing file.
pub async fn restore(path: &Path, publisher: &Publisher) -> io::Result<usize> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut count = 0;
    for line in content.lines() {
        publisher.deliver(line.trim().to_string());
        count += 1;
    }
    log::info!("Restored {} lines from {}", count, path.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queues::channels;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_stamp_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
        assert_eq!(stamp("hello", &at), "[01.03.2024 09:05] hello\n");
    }

    #[tokio::test]
    async fn test_append_raw_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");

        let mut transcript = Transcript::open(&path, false).await.unwrap();
        transcript.append("hello").await.unwrap();
        transcript.append("").await.unwrap();
        transcript.append("world").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "hello\n\nworld\n");
    }

    #[tokio::test]
    async fn test_append_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        std::fs::write(&path, "old\n").unwrap();

        let mut transcript = Transcript::open(&path, false).await.unwrap();
        transcript.append("new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\nnew\n");
    }

    #[tokio::test]
    async fn test_append_with_timestamps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");

        let mut transcript = Transcript::open(&path, true).await.unwrap();
        transcript.append("hello").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with('['));
        assert!(content.ends_with("] hello\n"));
    }

    #[tokio::test]
    async fn test_restore_replays_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chat.log");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        let (session, mut presenter) = channels();
        let count = restore(&path, &session.publisher).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(presenter.receive_rx.recv().await.as_deref(), Some("one"));
        assert_eq!(presenter.receive_rx.recv().await.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_restore_missing_file_is_empty_history() {
        let dir = TempDir::new().unwrap();
        let (session, mut presenter) = channels();

        let count = restore(&dir.path().join("absent.log"), &session.publisher)
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert!(presenter.receive_rx.try_recv().is_err());
    }
}
