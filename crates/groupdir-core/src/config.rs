//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! directory account (username and domain), service endpoints, and session
//! timings. The password is never stored here; see [`CredentialStore`].
//!
//! Configuration is stored at `~/.config/groupdir/config.json`.
//!
//! [`CredentialStore`]: crate::auth::CredentialStore

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::auth::SessionSettings;

/// Application name used for the config directory path
const APP_NAME: &str = "groupdir";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_LOGIN_URL: &str = "https://google.com/accounts/ClientLogin";
pub const DEFAULT_API_BASE_URL: &str = "https://apps-apis.google.com/a/feeds/group/2.0";

/// Tokens live ~24h; renew well before that.
pub const DEFAULT_RENEWAL_INTERVAL_MINUTES: u64 = 20 * 60;

pub const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub username: Option<String>,
    pub domain: Option<String>,
    pub login_url: String,
    pub api_base_url: String,
    pub renewal_interval_minutes: u64,
    pub verify_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            domain: None,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            renewal_interval_minutes: DEFAULT_RENEWAL_INTERVAL_MINUTES,
            verify_timeout_secs: DEFAULT_VERIFY_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
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

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            login_url: self.login_url.clone(),
            renewal_interval: Duration::from_secs(self.renewal_interval_minutes * 60),
            verify_timeout: Duration::from_secs(self.verify_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        let settings = config.session_settings();
        assert_eq!(settings.renewal_interval, Duration::from_secs(20 * 60 * 60));
        assert_eq!(settings.verify_timeout, Duration::from_secs(5));
        assert_eq!(settings.login_url, "https://google.com/accounts/ClientLogin");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"username": "admin@example.org", "domain": "example.org"}"#)
                .expect("Failed to parse partial config");
        assert_eq!(config.username.as_deref(), Some("admin@example.org"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.verify_timeout_secs, DEFAULT_VERIFY_TIMEOUT_SECS);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("groupdir-config-test-{}", std::process::id()))
            .join(CONFIG_FILE);
        let config = Config {
            username: Some("admin@example.org".to_string()),
            domain: Some("example.org".to_string()),
            renewal_interval_minutes: 90,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("groupdir-does-not-exist").join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }
}
