//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the tenant and app registration identifiers, the optional
//! development sync server, and the support form access key.
//!
//! Configuration is stored at `~/.config/tenantscope/config.json`. Values from
//! `TENANTSCOPE_*` environment variables take precedence over the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "tenantscope";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Tenant segment used when no tenant is configured yet
const DEFAULT_TENANT: &str = "organizations";

const ENV_TENANT_ID: &str = "TENANTSCOPE_TENANT_ID";
const ENV_CLIENT_ID: &str = "TENANTSCOPE_CLIENT_ID";
const ENV_SYNC_URL: &str = "TENANTSCOPE_SYNC_URL";
const ENV_WEB3FORMS_KEY: &str = "TENANTSCOPE_WEB3FORMS_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory (tenant) id or verified domain.
    pub tenant_id: Option<String>,
    /// Application (client) id of the app registration.
    pub client_id: Option<String>,
    /// Base URL of the development sync server exposing `/api/data/sitedata`.
    pub sync_url: Option<String>,
    pub web3forms_access_key: Option<String>,
    pub last_account: Option<String>,
    /// Also write logs to a daily rolling file in the cache directory.
    #[serde(default)]
    pub log_to_file: bool,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty(ENV_TENANT_ID) {
            self.tenant_id = Some(v);
        }
        if let Some(v) = non_empty(ENV_CLIENT_ID) {
            self.client_id = Some(v);
        }
        if let Some(v) = non_empty(ENV_SYNC_URL) {
            self.sync_url = Some(v);
        }
        if let Some(v) = non_empty(ENV_WEB3FORMS_KEY) {
            self.web3forms_access_key = Some(v);
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Tenant segment for identity platform URLs.
    pub fn tenant(&self) -> &str {
        self.tenant_id.as_deref().unwrap_or(DEFAULT_TENANT)
    }

    pub fn client_id(&self) -> Result<&str> {
        self.client_id.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No client id configured. Set {} or add client_id to {}",
                ENV_CLIENT_ID,
                CONFIG_FILE
            )
        })
    }

    /// Per-tenant cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if let Some(ref tenant) = self.tenant_id {
            path = path.join(sanitize_segment(tenant));
        }
        Ok(path)
    }
}

/// Keep tenant ids usable as a single directory name. Dot-only segments
/// (`.`, `..`) would escape the cache root.
fn sanitize_segment(value: &str) -> String {
    let segment: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    if segment.chars().all(|c| c == '.') {
        "_".repeat(segment.len().max(1))
    } else {
        segment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config {
            tenant_id: Some("contoso.onmicrosoft.com".to_string()),
            client_id: Some("from-file".to_string()),
            ..Default::default()
        };
        let env: HashMap<&str, &str> = [
            (ENV_CLIENT_ID, "from-env"),
            (ENV_SYNC_URL, "http://localhost:3001"),
            (ENV_TENANT_ID, "  "),
        ]
        .into_iter()
        .collect();

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.client_id.as_deref(), Some("from-env"));
        assert_eq!(config.sync_url.as_deref(), Some("http://localhost:3001"));
        // Blank values do not clobber the file
        assert_eq!(config.tenant_id.as_deref(), Some("contoso.onmicrosoft.com"));
    }

    #[test]
    fn test_tenant_defaults_to_organizations() {
        let config = Config::default();
        assert_eq!(config.tenant(), "organizations");
        assert!(config.client_id().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = Config {
            tenant_id: Some("t1".to_string()),
            log_to_file: true,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.tenant_id.as_deref(), Some("t1"));
        assert!(loaded.log_to_file);
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("contoso.onmicrosoft.com"), "contoso.onmicrosoft.com");
        assert_eq!(sanitize_segment("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_segment(".."), "__");
        assert_eq!(sanitize_segment("."), "_");
        assert_eq!(sanitize_segment(""), "_");
        assert_eq!(sanitize_segment("../.."), ".._..");
    }

    #[test]
    fn test_cache_dir_stays_under_app_dir() {
        let config = Config {
            tenant_id: Some("..".to_string()),
            ..Default::default()
        };
        if let Ok(dir) = config.cache_dir() {
            assert_eq!(dir.file_name().and_then(|n| n.to_str()), Some("__"));
            assert_eq!(
                dir.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()),
                Some(APP_NAME)
            );
        }
    }
}
