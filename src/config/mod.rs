//! Configuration management

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
}

/// WebSocket server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to accept client connections on
    pub listen_addr: SocketAddr,

    /// Upgrade path prefix; the session id follows it
    pub ws_path_prefix: String,

    /// Cookie carrying the opaque guest identity
    pub identity_cookie: String,

    /// Outbound messages buffered per connection before dropping
    pub outbound_queue_capacity: usize,

    /// Largest inbound text frame accepted, in bytes
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5001)),
            ws_path_prefix: "/ws/game/".to_string(),
            identity_cookie: "guest_id".to_string(),
            outbound_queue_capacity: 16,
            max_message_size: crate::protocol::MAX_MESSAGE_SIZE,
        }
    }
}

/// Shared store and event bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub redis_url: String,

    /// Prefix of record keys
    pub key_prefix: String,

    /// Prefix of per-session pub/sub channels
    pub channel_prefix: String,

    /// How long an untouched session record lives
    pub session_ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            key_prefix: String::new(),
            channel_prefix: "game:".to_string(),
            session_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl StoreConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Defaults for new sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub default_time_control: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_time_control: "5|3".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a file, or return defaults if it does not exist.
    /// `REDIS_URL` in the environment overrides the file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var("REDIS_URL") {
            if !url.is_empty() {
                config.store.redis_url = url;
            }
        }

        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tandem")
            .join("config.toml")
    }
}
