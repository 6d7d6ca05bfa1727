//! Configuration types for the port sync system
//!
//! This module defines all configuration structures used throughout the crate.
//! Configuration is built once at startup and validated before the loop runs.

use crate::traits::Credentials;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Longest accepted poll or health-check interval (one day)
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Main port sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Torrent client API configuration
    pub client: ClientConfig,

    /// Forwarded-port source configuration
    pub source: SourceConfig,

    /// Seconds between two reads of the port source
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Seconds between two health probes of the torrent client
    #[serde(default = "default_poll_interval_secs")]
    pub health_check_interval_secs: u64,

    /// Capacity of the monitoring event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SyncConfig {
    /// Create a configuration with default intervals
    pub fn new(client: ClientConfig, source: SourceConfig) -> Self {
        Self {
            client,
            source,
            poll_interval_secs: default_poll_interval_secs(),
            health_check_interval_secs: default_poll_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.client.validate()?;
        self.source.validate()?;

        validate_interval("poll interval", self.poll_interval_secs)?;
        validate_interval("health check interval", self.health_check_interval_secs)?;

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }
}

fn validate_interval(name: &str, secs: u64) -> Result<(), crate::Error> {
    if !(1..=MAX_INTERVAL_SECS).contains(&secs) {
        return Err(crate::Error::config(format!(
            "The {} must be between 1 and {} seconds. Got: {}",
            name, MAX_INTERVAL_SECS, secs
        )));
    }
    Ok(())
}

/// Torrent client API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the management API (e.g. "http://localhost:8080")
    pub base_url: String,

    /// Authentication mode
    #[serde(default)]
    pub auth: AuthConfig,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Log the port change instead of sending it
    #[serde(default)]
    pub dry_run: bool,
}

impl ClientConfig {
    /// Create a client configuration with authentication disabled
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: AuthConfig::Disabled,
            timeout_secs: default_timeout_secs(),
            dry_run: false,
        }
    }

    /// Set the authentication mode
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Validate the client configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.base_url.is_empty() {
            return Err(crate::Error::config("Torrent client URL cannot be empty"));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Torrent client URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }

        if let AuthConfig::Credentials { username, .. } = &self.auth
            && username.is_empty()
        {
            return Err(crate::Error::config(
                "Username cannot be empty when authentication is enabled",
            ));
        }

        Ok(())
    }
}

/// Authentication mode for the management API
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No login; requests carry no session credential
    ///
    /// Use this when the client whitelists this host (e.g. qBittorrent's
    /// "bypass authentication for clients on localhost").
    #[default]
    Disabled,

    /// Log in with these credentials before applying a port
    Credentials {
        /// Login user name
        username: String,
        /// Login password
        password: String,
    },
}

impl AuthConfig {
    /// Whether a login is required before talking to the API
    pub fn is_enabled(&self) -> bool {
        matches!(self, AuthConfig::Credentials { .. })
    }

    /// Credentials to log in with, `None` when authentication is disabled
    pub fn credentials(&self) -> Option<Credentials> {
        match self {
            AuthConfig::Disabled => None,
            AuthConfig::Credentials { username, password } => {
                Some(Credentials::new(username.clone(), password.clone()))
            }
        }
    }
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthConfig::Disabled => f.write_str("Disabled"),
            AuthConfig::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Forwarded-port source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the file the VPN client writes the forwarded port into
    pub path: PathBuf,
}

impl SourceConfig {
    /// Create a source configuration for a port file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.path.as_os_str().is_empty() {
            return Err(crate::Error::config("Port file path cannot be empty"));
        }
        Ok(())
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    100
}
