//! Pipeline configuration
//!
//! Stored as JSON. Every field has a default, so an empty object is a valid
//! configuration for a live session on `0.0.0.0:7070`.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogVariant;
use crate::error::ConfigError;
use crate::source::DEFAULT_MAX_DATAGRAM_SIZE;
use crate::store::{Retention, DEFAULT_FLAG_EVENT_LIMIT};

/// Default UDP listen port
pub const DEFAULT_PORT: u16 = 7070;

/// Default directory for session logs
pub const DEFAULT_LOG_DIR: &str = "data";

/// Environment variable overriding the live UDP port
pub const ENV_PORT: &str = "TRACKSIDE_UDP_PORT";

/// Where records come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Listen for UDP datagrams
    Live {
        /// Address to bind
        #[serde(default = "default_bind_addr")]
        bind_addr: IpAddr,
        /// Port to bind
        #[serde(default = "default_port")]
        port: u16,
        /// Receive buffer size in bytes
        #[serde(default = "default_max_datagram_size")]
        max_datagram_size: usize,
    },
    /// Replay a recorded session log
    Replay {
        /// Session log to read
        path: PathBuf,
        /// Delay between records in milliseconds
        #[serde(default)]
        pacing_ms: Option<u64>,
    },
}

impl SourceConfig {
    /// Live source on the default address and port
    pub fn live() -> Self {
        SourceConfig::Live {
            bind_addr: default_bind_addr(),
            port: default_port(),
            max_datagram_size: default_max_datagram_size(),
        }
    }

    /// Replay source for a log file, without pacing
    pub fn replay(path: impl Into<PathBuf>) -> Self {
        SourceConfig::Replay {
            path: path.into(),
            pacing_ms: None,
        }
    }

    /// Socket address for a live source
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            SourceConfig::Live {
                bind_addr, port, ..
            } => Some(SocketAddr::new(*bind_addr, *port)),
            SourceConfig::Replay { .. } => None,
        }
    }

    /// Pacing delay for a replay source
    pub fn pacing(&self) -> Option<Duration> {
        match self {
            SourceConfig::Replay { pacing_ms, .. } => pacing_ms.map(Duration::from_millis),
            SourceConfig::Live { .. } => None,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::live()
    }
}

fn default_bind_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_datagram_size() -> usize {
    DEFAULT_MAX_DATAGRAM_SIZE
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_DIR)
}

fn default_flag_retention() -> Retention {
    Retention::Bounded(DEFAULT_FLAG_EVENT_LIMIT)
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Record source
    pub source: SourceConfig,
    /// Channel set
    pub catalog: CatalogVariant,
    /// Sample retention per channel
    pub retention: Retention,
    /// Flag event retention
    #[serde(default = "default_flag_retention")]
    pub flag_retention: Retention,
    /// Directory for live session logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Sync every log row to disk
    pub sync_each_row: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            catalog: CatalogVariant::default(),
            retention: Retention::default(),
            flag_retention: default_flag_retention(),
            log_dir: default_log_dir(),
            sync_each_row: false,
        }
    }
}

impl PipelineConfig {
    /// Parse from a JSON string and validate
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply the live port override from the environment
    ///
    /// Unset, unparsable or zero values are ignored.
    pub fn apply_env(&mut self) {
        self.apply_port_override(std::env::var(ENV_PORT).ok().as_deref());
    }

    fn apply_port_override(&mut self, value: Option<&str>) {
        let override_port = value
            .and_then(|v| v.trim().parse::<u16>().ok())
            .filter(|&p| p > 0);
        if let (Some(p), SourceConfig::Live { port, .. }) = (override_port, &mut self.source) {
            *port = p;
        }
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention == Retention::Bounded(0) {
            return Err(invalid("retention", "window size must be at least 1"));
        }
        if self.flag_retention == Retention::Bounded(0) {
            return Err(invalid("flag_retention", "event limit must be at least 1"));
        }
        match &self.source {
            SourceConfig::Live {
                max_datagram_size: 0,
                ..
            } => Err(invalid("source.max_datagram_size", "must be at least 1 byte")),
            SourceConfig::Replay { path, .. } if path.as_os_str().is_empty() => {
                Err(invalid("source.path", "replay needs a session log path"))
            }
            _ => Ok(()),
        }
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.to_string(),
    }
}
