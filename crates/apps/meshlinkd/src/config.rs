//! Daemon configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all) yields a working single-node configuration. CLI flags
//! override file values in `main`.

use std::path::Path;
use std::time::Duration;

use meshlink::HeartbeatConfig;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("couldn't parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Interface address the listener binds.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Listening port. 0 picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker event loops.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Human-readable description announced to peers in the handshake.
    #[serde(default = "default_description")]
    pub description: String,

    /// Peers to dial at startup, as `host:port`.
    #[serde(default)]
    pub peers: Vec<String>,

    #[serde(default)]
    pub heartbeat: HeartbeatSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatSection {
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,

    #[serde(default = "default_latency_warn_ms")]
    pub latency_warn_ms: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    6900
}

fn default_pool_size() -> usize {
    2
}

fn default_description() -> String {
    "meshlink-node".into()
}

fn default_period_secs() -> u64 {
    15
}

fn default_latency_warn_ms() -> u64 {
    250
}

impl Default for HeartbeatSection {
    fn default() -> Self {
        Self {
            period_secs: default_period_secs(),
            latency_warn_ms: default_latency_warn_ms(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            pool_size: default_pool_size(),
            description: default_description(),
            peers: Vec::new(),
            heartbeat: HeartbeatSection::default(),
        }
    }
}

impl DaemonConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        HeartbeatConfig {
            period: Duration::from_secs(self.heartbeat.period_secs),
            latency_warn: Duration::from_millis(self.heartbeat.latency_warn_ms),
        }
    }
}
