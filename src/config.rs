//! Configuration loading.
//!
//! Values are layered, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. Optional JSON file (`--config`)
//! 3. `MINECHAT_*` environment variables
//! 4. Command-line flags (applied by the binary)
//!
//! Every timing parameter of the client lives here as milliseconds so the
//! integration tests can shrink the watchdog and backoff windows.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, str::FromStr};

use crate::constants;

/// Configuration for the chat client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Chat server host name or address.
    pub host: String,
    /// Port of the read-only broadcast socket.
    pub read_port: u16,
    /// Port of the authenticated write socket.
    pub write_port: u16,
    /// Credentials file holding the account token.
    pub credentials_path: PathBuf,
    /// Append-only transcript of received lines.
    pub transcript_path: PathBuf,
    /// Prefix transcript lines with a timestamp.
    pub timestamp_transcript: bool,
    /// Bound for a single line read/write or connect, in milliseconds.
    pub io_timeout_ms: u64,
    /// Delay before any reconnect, in milliseconds.
    pub reconnect_backoff_ms: u64,
    /// Silence tolerated by the watchdog, in milliseconds.
    pub watchdog_window_ms: u64,
    /// Pause after each consumed watchdog tick, in milliseconds.
    pub watchdog_pacing_ms: u64,
    /// Keep-alive pulse period, in milliseconds.
    pub keepalive_period_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: constants::DEFAULT_HOST.to_string(),
            read_port: constants::DEFAULT_READ_PORT,
            write_port: constants::DEFAULT_WRITE_PORT,
            credentials_path: PathBuf::from(constants::DEFAULT_CREDENTIALS_PATH),
            transcript_path: PathBuf::from(constants::DEFAULT_TRANSCRIPT_PATH),
            timestamp_transcript: false,
            io_timeout_ms: millis(constants::IO_TIMEOUT),
            reconnect_backoff_ms: millis(constants::RECONNECT_BACKOFF),
            watchdog_window_ms: millis(constants::WATCHDOG_WINDOW),
            watchdog_pacing_ms: millis(constants::WATCHDOG_PACING),
            keepalive_period_ms: millis(constants::KEEPALIVE_PERIOD),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl Config {
    /// Load defaults, then the optional file, then environment overrides.
    ///
    /// A `path` that does not exist yields the defaults; a file that exists
    /// but cannot be read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::load_from_file(path)?,
            Some(path) => {
                log::info!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `MINECHAT_*` overrides from an arbitrary lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("MINECHAT_HOST") {
            self.host = host;
        }

        if let Some(port) = parse_override(&lookup, "MINECHAT_READ_PORT") {
            self.read_port = port;
        }

        if let Some(port) = parse_override(&lookup, "MINECHAT_WRITE_PORT") {
            self.write_port = port;
        }

        if let Some(path) = lookup("MINECHAT_CREDENTIALS") {
            self.credentials_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("MINECHAT_TRANSCRIPT") {
            self.transcript_path = PathBuf::from(path);
        }
    }

    /// Read/write/connect bound.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Reconnect backoff.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    /// Watchdog silence window.
    pub fn watchdog_window(&self) -> Duration {
        Duration::from_millis(self.watchdog_window_ms)
    }

    /// Watchdog pacing delay.
    pub fn watchdog_pacing(&self) -> Duration {
        Duration::from_millis(self.watchdog_pacing_ms)
    }

    /// Keep-alive period.
    pub fn keepalive_period(&self) -> Duration {
        Duration::from_millis(self.keepalive_period_ms)
    }
}

fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}
