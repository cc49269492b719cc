//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which holds the backend base URI and the last identifier used to log in.
//!
//! Configuration is stored at `~/.config/gatekeeper/config.json`. The
//! `GATEKEEPER_BACKEND_URI` environment variable overrides the backend URI.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "gatekeeper";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `backend_uri`
pub const BACKEND_URI_ENV: &str = "GATEKEEPER_BACKEND_URI";

/// Backend used when nothing is configured
pub const DEFAULT_BACKEND_URI: &str = "http://localhost:8080/api/v1";

fn default_backend_uri() -> String {
    DEFAULT_BACKEND_URI.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_backend_uri")]
    pub backend_uri: String,
    #[serde(default)]
    pub last_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_uri: default_backend_uri(),
            last_identifier: None,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(uri) = std::env::var(BACKEND_URI_ENV) {
            config.backend_uri = uri;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(self.backend_uri.trim())
            .with_context(|| format!("Invalid backend URI: {}", self.backend_uri))?;
        if url.host_str().is_none() {
            anyhow::bail!("Backend URI has no host: {}", self.backend_uri);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Base cache directory (log files live here)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Session directory, one per backend origin so sessions for different
    /// backends never mix.
    pub fn session_dir(&self) -> Result<PathBuf> {
        Ok(Self::cache_dir()?.join(origin_key(&self.backend_uri)?))
    }
}

/// Filesystem-safe key for the origin (scheme, host, port) of `uri`.
pub fn origin_key(uri: &str) -> Result<String> {
    let url = Url::parse(uri.trim()).with_context(|| format!("Invalid backend URI: {}", uri))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Backend URI has no host: {}", uri))?;
    let port = url
        .port_or_known_default()
        .map(|p| p.to_string())
        .unwrap_or_default();

    let raw = format!("{}_{}_{}", url.scheme(), host, port);
    Ok(raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect())
}
