use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::vault::Vault;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.bin";

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// Signed-in account (UPN) when known.
    #[serde(default)]
    pub account: Option<String>,
    pub tenant_id: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the access token will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s.eq_ignore_ascii_case(scope))
    }
}

/// Persisted sign-in state. Without a vault the session lives in memory only.
pub struct Session {
    cache_dir: PathBuf,
    vault: Option<Vault>,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf, vault: Option<Vault>) -> Self {
        Self {
            cache_dir,
            vault,
            data: None,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.vault.is_some()
    }

    /// Load session from disk. Expired sessions are kept when they carry a
    /// refresh token, since they can still be renewed.
    pub fn load(&mut self) -> Result<bool> {
        let Some(ref vault) = self.vault else {
            debug!("No session vault, skipping session load");
            return Ok(false);
        };
        let path = self.session_path();
        if !path.exists() {
            return Ok(false);
        }

        let sealed = std::fs::read(&path).context("Failed to read session file")?;
        let plain = vault.open(&sealed)?;
        let data: SessionData =
            serde_json::from_slice(&plain).context("Failed to parse session file")?;

        if data.is_expired() && !data.can_refresh() {
            debug!("Stored session expired");
            return Ok(false);
        }
        self.data = Some(data);
        Ok(true)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        let (Some(vault), Some(data)) = (&self.vault, &self.data) else {
            return Ok(());
        };
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let plain = serde_json::to_vec(data)?;
        let sealed = vault.seal(&plain)?;
        std::fs::write(&path, sealed).context("Failed to write session file")?;
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Update session with new data, persisting it when possible
    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
        if let Err(e) = self.save() {
            warn!(error = %e, "Failed to persist session");
        }
    }

    /// Get the bearer token if the session is valid
    pub fn token(&self) -> Option<&str> {
        self.data
            .as_ref()
            .filter(|d| !d.is_expired())
            .map(|d| d.access_token.as_str())
    }

    pub fn account(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.account.as_deref())
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }

    pub fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}
