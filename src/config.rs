use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:8000/ws/workflow";

const DEFAULT_STREAM_RETRY_DELAY_MS: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid yaml in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("settings validation failed: {0}")]
    Settings(String),
}

/// Client settings. The session log and any other local state live under
/// `state_root`; nothing execution-related is persisted there.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    pub state_root: PathBuf,
    #[serde(default = "default_stream_retry_delay_ms")]
    pub stream_retry_delay_ms: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_socket_url() -> String {
    DEFAULT_SOCKET_URL.to_string()
}

fn default_stream_retry_delay_ms() -> u64 {
    DEFAULT_STREAM_RETRY_DELAY_MS
}

impl Settings {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            api_base: default_api_base(),
            socket_url: default_socket_url(),
            state_root: state_root.into(),
            stream_retry_delay_ms: DEFAULT_STREAM_RETRY_DELAY_MS,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            source: err,
        })?;
        let mut settings: Settings =
            serde_yaml::from_str(&raw).map_err(|err| ConfigError::Parse {
                path: path.display().to_string(),
                source: err,
            })?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// `REDRELAY_API_BASE` and `REDRELAY_SOCKET_URL` win over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(base) = non_empty_env("REDRELAY_API_BASE") {
            self.api_base = base;
        }
        if let Some(url) = non_empty_env("REDRELAY_SOCKET_URL") {
            self.socket_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::Settings("api_base must be non-empty".into()));
        }
        if !self.socket_url.starts_with("ws://") && !self.socket_url.starts_with("wss://") {
            return Err(ConfigError::Settings(format!(
                "socket_url must use a ws:// or wss:// scheme, got `{}`",
                self.socket_url
            )));
        }
        if self.state_root.as_os_str().is_empty() {
            return Err(ConfigError::Settings("state_root must be set".into()));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
