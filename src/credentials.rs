//! Credentials file: the single source of the account token.
//!
//! The file is the JSON object the server returns on registration:
//!
//! ```json
//! {"nickname": "bob", "account_hash": "7c2e..."}
//! ```
//!
//! Only `account_hash` matters to the connection core.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::Path};

/// Account credentials issued by the server.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Opaque authentication token.
    #[serde(default)]
    pub account_hash: String,

    /// Display name chosen at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl Credentials {
    /// Parse credentials from the server's registration response.
    pub fn from_json(raw: &str) -> Result<Self> {
        let creds: Self = serde_json::from_str(raw).context("Credentials are not a JSON object")?;
        if creds.account_hash.is_empty() {
            anyhow::bail!("Credentials carry no account_hash");
        }
        Ok(creds)
    }

    /// Load credentials from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read credentials file {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid credentials file {}", path.display()))
    }

    /// Write credentials to `path`, readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Could not write credentials file {}", path.display()))?;

        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        log::info!("Saved credentials to {}", path.display());
        Ok(())
    }

    /// The token, if it looks usable.
    pub fn token(&self) -> Option<&str> {
        let token = self.account_hash.trim();
        (!token.is_empty()).then_some(token)
    }
}

/// Load just the token from a credentials file.
///
/// Any failure (missing file, bad JSON, empty hash) means there is no
/// usable token, which the caller treats as an invalid-token condition.
pub fn load_token(path: &Path) -> Result<String> {
    let creds = Credentials::load(path)?;
    creds
        .token()
        .map(str::to_owned)
        .context("Credentials file holds an empty token")
}
