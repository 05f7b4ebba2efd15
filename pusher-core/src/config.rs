//! Client configuration management.
//!
//! Handles loading, saving, and accessing client configuration including
//! the application key, service host, channel-authorization endpoint, and
//! connection tunables. Configuration is persisted as TOML on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::constants;
use crate::error::{PusherError, PusherResult};

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PusherConfig {
    /// Application key assigned by the service.
    #[serde(default)]
    pub app_key: String,

    /// Service host to connect to.
    #[serde(default = "default_host")]
    pub host: String,

    /// WebSocket port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between keepalive pings.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_interval_secs: u64,

    /// Capacity of each per-event delivery channel handed out by `bind`.
    #[serde(default = "default_delivery_capacity")]
    pub delivery_channel_capacity: usize,

    /// Channel-authorization settings for private channels.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Channel-authorization endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// URL of the authorization endpoint (e.g. "https://example.com/pusher/auth").
    #[serde(default)]
    pub url: String,

    /// Custom HTTP headers sent with every authorization request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Authorization request timeout in milliseconds.
    #[serde(default = "default_auth_timeout")]
    pub timeout_ms: u64,

    /// Accept invalid/self-signed TLS certificates from the authorization
    /// endpoint. Off by default; only enable for local development.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Minimum TLS version for the authorization request: "1.2" or "1.3".
    /// When unset, reqwest's default policy applies.
    #[serde(default)]
    pub min_tls_version: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, console-only logging is used.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output for the file layer.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_host() -> String {
    constants::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    constants::DEFAULT_PORT
}

fn default_keepalive_secs() -> u64 {
    constants::KEEPALIVE_INTERVAL_SECS
}

fn default_delivery_capacity() -> usize {
    constants::DELIVERY_CHANNEL_CAPACITY
}

fn default_auth_timeout() -> u64 {
    constants::DEFAULT_AUTH_TIMEOUT_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            host: default_host(),
            port: default_port(),
            keepalive_interval_secs: default_keepalive_secs(),
            delivery_channel_capacity: default_delivery_capacity(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: HashMap::new(),
            timeout_ms: default_auth_timeout(),
            accept_invalid_certs: false,
            min_tls_version: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl PusherConfig {
    /// Create a configuration for the given application key with defaults
    /// for everything else.
    pub fn for_app_key(app_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            ..Self::default()
        }
    }

    /// Load configuration from the default config file path.
    pub fn load_default() -> PusherResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> PusherResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: PusherConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> PusherResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PusherError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PusherResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PusherError::Config("no config directory on this platform".into()))?;
        Ok(config_dir.join("pusher").join("config.toml"))
    }

    /// Build the WebSocket connection URL for this configuration.
    ///
    /// The protocol version and client identity are negotiated as query
    /// parameters per the service's connection contract.
    pub fn ws_url(&self) -> PusherResult<String> {
        if self.app_key.is_empty() {
            return Err(PusherError::MissingConfig("app_key".into()));
        }
        Ok(format!(
            "wss://{}:{}/app/{}?protocol={}&client={}&version={}",
            self.host,
            self.port,
            self.app_key,
            constants::PROTOCOL_VERSION,
            constants::CLIENT_NAME,
            constants::CLIENT_VERSION,
        ))
    }

    /// Whether the channel-authorization endpoint is configured.
    pub fn is_auth_configured(&self) -> bool {
        !self.auth.url.is_empty()
    }
}

/// Thread-safe configuration holder for shared access across tasks.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<PusherConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: PusherConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, PusherConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, PusherConfig> {
        self.inner.write().await
    }
}
