//! Client configuration.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:9999/lost-found";
pub const DEFAULT_WS_URL: &str = "ws://localhost:9999/ws";
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(4000);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid API url {0}: {1}")]
    InvalidApiUrl(String, String),

    #[error("Invalid websocket url {0}: {1}")]
    InvalidWsUrl(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST root, e.g. `http://localhost:9999/lost-found`
    pub api_url: String,
    /// STOMP endpoint, e.g. `ws://localhost:9999/ws`
    pub ws_url: String,
    pub reconnect_delay: Duration,
    pub heartbeat_outgoing: Duration,
    pub heartbeat_incoming: Duration,
    /// Where the logged-in user is persisted
    pub storage_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            heartbeat_outgoing: DEFAULT_HEARTBEAT,
            heartbeat_incoming: DEFAULT_HEARTBEAT,
            storage_path: Self::default_storage_path(),
        }
    }
}

impl ClientConfig {
    /// `<config dir>/campus-chat/session.json`, or the working directory
    /// when the platform has no config dir.
    pub fn default_storage_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("campus-chat")
            .join("session.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let api = Url::parse(&self.api_url)
            .map_err(|e| ConfigError::InvalidApiUrl(self.api_url.clone(), e.to_string()))?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiUrl(
                self.api_url.clone(),
                format!("unsupported scheme {}", api.scheme()),
            ));
        }

        let ws = Url::parse(&self.ws_url)
            .map_err(|e| ConfigError::InvalidWsUrl(self.ws_url.clone(), e.to_string()))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidWsUrl(
                self.ws_url.clone(),
                format!("unsupported scheme {}", ws.scheme()),
            ));
        }
        Ok(())
    }
}
