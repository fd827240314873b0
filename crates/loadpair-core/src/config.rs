//! Configuration system for loadpair.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LOADPAIR_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/loadpair/config.toml
//!   3. ~/.config/loadpair/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadpairConfig {
    pub network: NetworkConfig,
    pub discovery: DiscoveryConfig,
    pub traffic: TrafficConfig,
    pub queues: QueueConfig,
    pub display: DisplayConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the listener binds on. Port probing uses the same host.
    pub bind_host: String,
    /// First port of the shared range. Both self-binding and discovery use it.
    pub port_base: u16,
    /// Number of ports in the range.
    pub port_count: u16,
    pub connect_timeout_ms: u64,
    /// Applies to handshake responses and to inbound message reads.
    pub read_timeout_ms: u64,
    /// One message = one read of at most this many bytes.
    pub max_message_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Fan out over the local /24 when nothing answers on loopback.
    pub subnet_scan: bool,
    /// How long to wait for an inbound DISCOVER between rounds.
    pub retry_window_ms: u64,
    /// Upper bound on in-flight probes during a round.
    pub max_concurrent_probes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub fast_base_ms: u64,
    pub fast_jitter_ms: u64,
    pub dynamic_short_ms: u64,
    pub dynamic_long_ms: u64,
    /// Probability of picking `dynamic_short_ms` on each iteration.
    pub dynamic_short_probability: f64,
    pub slow_base_ms: u64,
    pub slow_jitter_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Value every counter holds at startup.
    pub initial_value: u32,
    /// A counter found above this on a decay tick resets to 0.
    pub ceiling: u32,
    pub decay_interval_ms: u64,
    pub snapshot_interval_ms: u64,
    /// Snapshots queued for the display before new ones are dropped.
    pub snapshot_buffer: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Print every snapshot as a JSON line on stdout.
    pub print_snapshots: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// HTTP status endpoint port on 127.0.0.1. 0 = disabled.
    pub port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port_base: 50500,
            port_count: 100,
            connect_timeout_ms: 1000,
            read_timeout_ms: 2000,
            max_message_bytes: 1024,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            subnet_scan: true,
            retry_window_ms: 10_000,
            max_concurrent_probes: 512,
        }
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            fast_base_ms: 200,
            fast_jitter_ms: 50,
            dynamic_short_ms: 50,
            dynamic_long_ms: 3000,
            dynamic_short_probability: 0.8,
            slow_base_ms: 1000,
            slow_jitter_ms: 200,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            initial_value: 50,
            ceiling: 100,
            decay_interval_ms: 1000,
            snapshot_interval_ms: 100,
            snapshot_buffer: 16,
        }
    }
}

// ── Accessors ─────────────────────────────────────────────────────────────────

impl NetworkConfig {
    /// Exclusive upper end of the port range, saturating at u16::MAX.
    pub fn port_end(&self) -> u16 {
        self.port_base.saturating_add(self.port_count)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl DiscoveryConfig {
    pub fn retry_window(&self) -> Duration {
        Duration::from_millis(self.retry_window_ms)
    }
}

impl QueueConfig {
    pub fn decay_interval(&self) -> Duration {
        Duration::from_millis(self.decay_interval_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("loadpair")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl LoadpairConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            LoadpairConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LOADPAIR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&LoadpairConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply LOADPAIR_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("LOADPAIR_NETWORK__BIND_HOST") {
            self.network.bind_host = v;
        }
        if let Some(p) = lookup("LOADPAIR_NETWORK__PORT_BASE").and_then(|v| v.parse().ok()) {
            self.network.port_base = p;
        }
        if let Some(n) = lookup("LOADPAIR_NETWORK__PORT_COUNT").and_then(|v| v.parse().ok()) {
            self.network.port_count = n;
        }
        if let Some(v) = lookup("LOADPAIR_DISCOVERY__SUBNET_SCAN") {
            self.discovery.subnet_scan = v == "true" || v == "1";
        }
        if let Some(n) = lookup("LOADPAIR_QUEUES__INITIAL_VALUE").and_then(|v| v.parse().ok()) {
            self.queues.initial_value = n;
        }
        if let Some(v) = lookup("LOADPAIR_DISPLAY__PRINT_SNAPSHOTS") {
            self.display.print_snapshots = v == "true" || v == "1";
        }
        if let Some(p) = lookup("LOADPAIR_STATUS__PORT").and_then(|v| v.parse().ok()) {
            self.status.port = p;
        }
    }
}
