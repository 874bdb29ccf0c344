//! Configuration Management
//!
//! Handles persistent configuration storage for rmine.

use crate::api::Auth;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the configured URL
pub const URL_ENV: &str = "REDMINE_URL";
/// Environment variable overriding the configured API key
pub const KEY_ENV: &str = "REDMINE_KEY";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Base URL of the Redmine instance
    #[serde(default)]
    pub url: Option<String>,
    /// REST API key
    #[serde(default)]
    pub key: Option<String>,
    /// Basic auth user (used when no key is set)
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Server version, used to refuse unsupported resource types early
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rmine").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective URL (config > REDMINE_URL)
    pub fn effective_url(&self) -> Option<String> {
        self.url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| std::env::var(URL_ENV).ok().filter(|u| !u.is_empty()))
    }

    /// Get effective API key (config > REDMINE_KEY)
    pub fn effective_key(&self) -> Option<String> {
        self.key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(KEY_ENV).ok().filter(|k| !k.is_empty()))
    }

    /// Credentials to send: API key first, then basic auth
    pub fn auth(&self) -> Auth {
        if let Some(key) = self.effective_key() {
            return Auth::ApiKey(key);
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Auth::Anonymous,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Overlay values given on the command line
    pub fn merge(mut self, other: Config) -> Self {
        self.url = other.url.or(self.url);
        self.key = other.key.or(self.key);
        self.username = other.username.or(self.username);
        self.password = other.password.or(self.password);
        self.version = other.version.or(self.version);
        self.timeout_secs = other.timeout_secs.or(self.timeout_secs);
        self
    }
}
