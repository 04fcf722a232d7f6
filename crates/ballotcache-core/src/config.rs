//! Application configuration management.
//!
//! Configuration is stored at `~/.config/ballotcache/config.json` unless a
//! path is given explicitly. Missing files load as defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::DEFAULT_BASE_URL;
use crate::auth::ApiKeyStore;
use crate::cache::DEFAULT_CACHE_DURATION_HOURS;
use crate::staleness::DEFAULT_STALE_THRESHOLD_DAYS;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "ballotcache";

const CONFIG_FILE: &str = "config.json";
const STORAGE_FILE: &str = "storage.json";

/// Environment variable checked before the keychain for the API key.
pub const API_KEY_ENV: &str = "FEC_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub cache_duration_hours: i64,
    pub stale_threshold_days: i64,
    /// Defaults to `storage.json` in the cache directory.
    pub storage_path: Option<PathBuf>,
    /// Key material for sealing admin records; generated on first use.
    pub session_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            cache_duration_hours: DEFAULT_CACHE_DURATION_HOURS,
            stale_threshold_days: DEFAULT_STALE_THRESHOLD_DAYS,
            storage_path: None,
            session_secret: None,
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
            let config = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            debug!(path = %path.display(), "Config loaded");
            Ok(config)
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

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        match &self.storage_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::cache_dir()?.join(STORAGE_FILE)),
        }
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::hours(self.cache_duration_hours)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::days(self.stale_threshold_days)
    }

    /// The session secret, generating one if absent.
    /// Returns true when a new secret was generated and the config should be saved.
    pub fn ensure_session_secret(&mut self) -> (String, bool) {
        if let Some(secret) = self.session_secret.as_ref().filter(|s| !s.is_empty()) {
            return (secret.clone(), false);
        }
        let bytes: [u8; 32] = rand::random();
        let secret = hex::encode(bytes);
        self.session_secret = Some(secret.clone());
        (secret, true)
    }

    /// API key from the environment, else the keychain, else none.
    pub fn api_key() -> Option<String> {
        if let Some(key) = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()) {
            return Some(key);
        }
        match ApiKeyStore::get() {
            Ok(key) => key.filter(|k| !k.is_empty()),
            Err(e) => {
                warn!(error = %e, "Keychain unavailable, continuing without an API key");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_duration(), Duration::hours(24));
        assert_eq!(config.stale_threshold(), Duration::days(7));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"cache_duration_hours": 6}"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.cache_duration_hours, 6);
        assert_eq!(config.api_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config {
            storage_path: Some(dir.path().join("storage.json")),
            ..Config::default()
        };
        let (secret, generated) = config.ensure_session_secret();
        assert!(generated);
        assert_eq!(secret.len(), 64);
        config.save_to(&path).unwrap();

        let mut loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.ensure_session_secret(), (secret, false));
        assert_eq!(loaded.storage_path().unwrap(), dir.path().join("storage.json"));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
