//! Viewer configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::transport::validate_port;
use framecast_core::{DEFAULT_MAX_RECEIVE_PAYLOAD, FramecastError, SocketOptions};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Listen address and socket tuning.
    pub network: NetworkConfig,
    /// Where decoded frames go.
    pub display: DisplayConfig,
    /// Session handling.
    pub session: SessionConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind ("0.0.0.0" accepts from any interface).
    pub bind_host: String,
    /// Port to listen on (1024..=65535).
    pub port: u16,
    pub recv_buffer_bytes: u32,
    /// Seconds without a complete envelope before the session is dropped;
    /// 0 waits forever.
    pub idle_timeout_secs: u64,
    /// Largest envelope accepted, in bytes.
    pub max_payload_bytes: usize,
}

/// Display sink kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Periodically write the latest frame to a JPEG file.
    Snapshot,
    /// Count frames and discard them.
    Null,
}

impl std::str::FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snapshot" => Ok(Self::Snapshot),
            "null" => Ok(Self::Null),
            other => Err(format!("unknown sink '{other}' (expected snapshot or null)")),
        }
    }
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub sink: SinkKind,
    /// Snapshot file path.
    pub snapshot_path: PathBuf,
    /// Minimum milliseconds between snapshot writes.
    pub snapshot_interval_ms: u64,
    /// JPEG quality of written snapshots.
    pub snapshot_quality: u8,
}

/// Session handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Exit after the first session instead of accepting again.
    pub once: bool,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".into(),
            port: 7340,
            recv_buffer_bytes: 1024 * 1024,
            idle_timeout_secs: 30,
            max_payload_bytes: DEFAULT_MAX_RECEIVE_PAYLOAD,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Snapshot,
            snapshot_path: PathBuf::from("framecast-latest.jpg"),
            snapshot_interval_ms: 1000,
            snapshot_quality: 85,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ViewerConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Reject values that cannot start the listener.
    pub fn validate(&self) -> Result<(), FramecastError> {
        validate_port(self.network.port)?;
        if self.network.bind_host.trim().is_empty() {
            return Err(FramecastError::InvalidAddress("empty bind host".into()));
        }
        if self.network.max_payload_bytes == 0 {
            return Err(FramecastError::InvalidConfig("max_payload_bytes must be > 0".into()));
        }
        if !(1..=100).contains(&self.display.snapshot_quality) {
            return Err(FramecastError::InvalidConfig(format!(
                "snapshot_quality {} out of range (1..=100)",
                self.display.snapshot_quality
            )));
        }
        Ok(())
    }

    pub fn to_socket_options(&self) -> SocketOptions {
        let net = &self.network;
        SocketOptions {
            recv_buffer_size: (net.recv_buffer_bytes > 0).then_some(net.recv_buffer_bytes),
            io_timeout: self.idle_timeout(),
            ..SocketOptions::default()
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.network.idle_timeout_secs > 0).then(|| Duration::from_secs(self.network.idle_timeout_secs))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ViewerConfig::default()).unwrap();
        assert!(text.contains("bind_host"));
        assert!(text.contains("sink = \"snapshot\""));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ViewerConfig::default()).unwrap();
        let parsed: ViewerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 7340);
        assert_eq!(parsed.display.sink, SinkKind::Snapshot);
        assert!(!parsed.session.once);
    }

    #[test]
    fn sink_kind_parses() {
        assert_eq!("null".parse::<SinkKind>().unwrap(), SinkKind::Null);
        assert!("window".parse::<SinkKind>().is_err());
    }

    #[test]
    fn port_range_is_enforced() {
        let mut cfg = ViewerConfig::default();
        cfg.network.port = 1023;
        assert!(matches!(cfg.validate(), Err(FramecastError::PortOutOfRange(1023))));
        cfg.network.port = 1024;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_idle_timeout_disables_it() {
        let mut cfg = ViewerConfig::default();
        assert_eq!(cfg.idle_timeout(), Some(Duration::from_secs(30)));
        cfg.network.idle_timeout_secs = 0;
        assert_eq!(cfg.to_socket_options().io_timeout, None);
    }

    #[test]
    fn write_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.toml");
        ViewerConfig::write_default(&path).unwrap();
        assert_eq!(ViewerConfig::load(&path).network.bind_host, "0.0.0.0");
    }
}
