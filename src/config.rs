//! Application configuration
//!
//! Loaded from an optional JSON file, then overridden from the environment.
//! Credentials are never compiled in.

use crate::recorder::RecordingConfig;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENV_STORE_URL: &str = "SUPABASE_URL";
pub const ENV_STORE_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_API_URL: &str = "ANALYSIS_API_URL";
pub const ENV_API_TIMEOUT: &str = "ANALYSIS_API_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

/// Hosted Postgres REST gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_stale_time_secs")]
    pub stale_time_secs: u64,
}

fn default_stale_time_secs() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time_secs: default_stale_time_secs(),
        }
    }
}

impl CacheConfig {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }
}

impl AppConfig {
    /// Load from `path` (if given) and the process environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Override fields from environment variables, looked up through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_STORE_URL) {
            self.store.url = url;
        }
        if let Some(key) = lookup(ENV_STORE_KEY) {
            self.store.anon_key = key;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Some(timeout) = lookup(ENV_API_TIMEOUT) {
            self.api.timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("{ENV_API_TIMEOUT} must be a whole number of seconds"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store.url.trim().is_empty() {
            bail!("store url is not set (use {ENV_STORE_URL})");
        }
        if self.store.anon_key.trim().is_empty() {
            bail!("store key is not set (use {ENV_STORE_KEY})");
        }
        if self.api.base_url.trim().is_empty() {
            bail!("analysis API url is empty");
        }
        if !(1..=600).contains(&self.api.timeout_secs) {
            bail!("API timeout must be between 1 and 600 seconds, got {}", self.api.timeout_secs);
        }
        if self.recording.timeslice_ms == 0 {
            bail!("recording timeslice must be positive");
        }
        if self.recording.finalize_timeout_ms == 0 {
            bail!("recording finalize timeout must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.cache.stale_time(), Duration::from_secs(30));
        assert_eq!(config.recording.timeslice_ms, 1000);
        // no credentials out of the box
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "store": {"url": "https://file.supabase.co", "anon_key": "file-key"},
                "api": {"base_url": "https://api.example.com"},
                "cache": {"stale_time_secs": 60}
            }"#,
        )
        .unwrap();

        let mut config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.cache.stale_time_secs, 60);

        config
            .apply_env(env(&[
                (ENV_STORE_KEY, "env-key"),
                (ENV_API_TIMEOUT, "45"),
            ]))
            .unwrap();
        assert_eq!(config.store.url, "https://file.supabase.co");
        assert_eq!(config.store.anon_key, "env-key");
        assert_eq!(config.api.timeout(), Duration::from_secs(45));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_timeout_env() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[(ENV_API_TIMEOUT, "soon")])).is_err());

        config.store = StoreConfig {
            url: "https://x.supabase.co".into(),
            anon_key: "k".into(),
        };
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = AppConfig::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
