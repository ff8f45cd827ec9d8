use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use tradedesk_engine::{ApiSettings, PollSettings};
use tradedesk_logging::{desk_info, parse_level};

/// Default config file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "tradedesk.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Client settings. Every field is optional in the file; missing ones take the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub scan_poll_ms: u64,
    pub data_poll_ms: u64,
    pub tail_poll_ms: u64,
    pub tail_flush_delay_ms: u64,
    pub tail_error_backoff_ms: u64,
    pub max_consecutive_failures: u32,
    pub toast_ttl_ms: u64,
    pub log_level: String,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout_ms: 5000,
            request_timeout_ms: 15000,
            scan_poll_ms: 1000,
            data_poll_ms: 2000,
            tail_poll_ms: 500,
            tail_flush_delay_ms: 1000,
            tail_error_backoff_ms: 1000,
            max_consecutive_failures: 10,
            toast_ttl_ms: 3500,
            log_level: "info".to_string(),
        }
    }
}

impl DeskConfig {
    /// Reads `path`, or `./tradedesk.ron` when none is given. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                desk_info!("no config at {:?}; using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        let config = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        desk_info!("loaded config from {:?}", path);
        Ok(config)
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            scan_interval: Duration::from_millis(self.scan_poll_ms),
            data_interval: Duration::from_millis(self.data_poll_ms),
            tail_interval: Duration::from_millis(self.tail_poll_ms),
            tail_flush_delay: Duration::from_millis(self.tail_flush_delay_ms),
            tail_error_backoff: Duration::from_millis(self.tail_error_backoff_ms),
            max_consecutive_failures: self.max_consecutive_failures.max(1),
        }
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }

    pub fn level(&self) -> LevelFilter {
        parse_level(&self.log_level)
    }
}
