//! Configuration for the sender.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::pipeline::{DEFAULT_POP_TIMEOUT, DEFAULT_TARGET_FPS};
use framecast_core::transport::validate_port;
use framecast_core::{
    DEFAULT_BUFFER_CAPACITY, FramecastError, PlatformProfile, ProfilePreset, SocketOptions,
    StreamSettings,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Viewer address and socket tuning.
    pub network: NetworkConfig,
    /// Pacing, buffering and quality.
    pub stream: StreamConfig,
    /// Frame source settings.
    pub source: SourceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Viewer host name or IP.
    pub server_host: String,
    /// Viewer port (1024..=65535).
    pub server_port: u16,
    pub connect_timeout_secs: u64,
    /// Per-envelope send deadline; 0 disables it.
    pub send_timeout_secs: u64,
    /// Disable Nagle's algorithm.
    pub nodelay: bool,
    pub send_buffer_bytes: u32,
    pub recv_buffer_bytes: u32,
}

/// Stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Target frames per second (1..=120).
    pub fps: u32,
    /// Frames held between capture and encode.
    pub buffer_capacity: usize,
    /// Enable adaptive quality adjustment.
    pub adaptive_quality: bool,
    /// Profile preset: "balanced", "low-bandwidth", "high-fidelity".
    pub profile: ProfilePreset,
    /// Starting JPEG quality; the profile default when absent.
    pub initial_quality: Option<u8>,
    /// Seconds between performance reports.
    pub report_interval_secs: u64,
}

/// Frame source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Test-pattern width in pixels.
    pub width: u32,
    /// Test-pattern height in pixels.
    pub height: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

/// Port both sides use unless configured otherwise.
pub const DEFAULT_PORT: u16 = 7340;

/// Largest test-pattern width or height.
pub const MAX_SOURCE_DIMENSION: u32 = 16_384;

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".into(),
            server_port: DEFAULT_PORT,
            connect_timeout_secs: 10,
            send_timeout_secs: 10,
            nodelay: true,
            send_buffer_bytes: 1024 * 1024,
            recv_buffer_bytes: 1024 * 1024,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_TARGET_FPS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            adaptive_quality: true,
            profile: ProfilePreset::Balanced,
            initial_quality: None,
            report_interval_secs: 10,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
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

impl SenderConfig {
    /// Load configuration from a TOML file, falling back to defaults.
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

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Reject values that cannot start a session.
    pub fn validate(&self) -> Result<(), FramecastError> {
        validate_port(self.network.server_port)?;
        if self.network.server_host.trim().is_empty() {
            return Err(FramecastError::InvalidAddress("empty server host".into()));
        }
        if !(1..=120).contains(&self.stream.fps) {
            return Err(FramecastError::InvalidConfig(format!(
                "fps {} out of range (1..=120)",
                self.stream.fps
            )));
        }
        if self.stream.buffer_capacity == 0 {
            return Err(FramecastError::InvalidConfig("buffer_capacity must be > 0".into()));
        }
        if let Some(q) = self.stream.initial_quality.filter(|q| !(1..=100).contains(q)) {
            return Err(FramecastError::InvalidConfig(format!(
                "initial_quality {q} out of range (1..=100)"
            )));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(FramecastError::InvalidConfig("source size must be non-zero".into()));
        }
        if self.source.width > MAX_SOURCE_DIMENSION || self.source.height > MAX_SOURCE_DIMENSION {
            return Err(FramecastError::InvalidConfig(format!(
                "source size {}x{} exceeds {MAX_SOURCE_DIMENSION}",
                self.source.width, self.source.height
            )));
        }
        Ok(())
    }

    /// The platform profile selected by `stream.profile`.
    pub fn profile(&self) -> PlatformProfile {
        self.stream.profile.profile()
    }

    /// Convert stream settings into the session's [`StreamSettings`].
    pub fn to_stream_settings(&self) -> StreamSettings {
        StreamSettings {
            target_fps: self.stream.fps.clamp(1, 120),
            buffer_capacity: self.stream.buffer_capacity.max(1),
            pop_timeout: DEFAULT_POP_TIMEOUT,
            report_interval: Duration::from_secs(self.stream.report_interval_secs.max(1)),
            adaptive: self.stream.adaptive_quality,
        }
    }

    /// Convert network settings into [`SocketOptions`].
    pub fn to_socket_options(&self) -> SocketOptions {
        let net = &self.network;
        SocketOptions {
            nodelay: net.nodelay,
            send_buffer_size: (net.send_buffer_bytes > 0).then_some(net.send_buffer_bytes),
            recv_buffer_size: (net.recv_buffer_bytes > 0).then_some(net.recv_buffer_bytes),
            connect_timeout: Duration::from_secs(net.connect_timeout_secs.max(1)),
            io_timeout: (net.send_timeout_secs > 0).then(|| Duration::from_secs(net.send_timeout_secs)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = SenderConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("server_port"));
        assert!(text.contains("fps"));
        assert!(text.contains("profile = \"balanced\""));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = SenderConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SenderConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.server_port, DEFAULT_PORT);
        assert_eq!(parsed.stream.fps, 30);
        assert_eq!(parsed.stream.initial_quality, None);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: SenderConfig = toml::from_str(
            "[stream]\nfps = 15\nprofile = \"low-bandwidth\"\n",
        )
        .unwrap();
        assert_eq!(parsed.stream.fps, 15);
        assert_eq!(parsed.stream.profile, ProfilePreset::LowBandwidth);
        assert_eq!(parsed.network.server_host, "127.0.0.1");
        assert_eq!(parsed.profile().max_width, 960);
    }

    #[test]
    fn privileged_port_is_rejected() {
        let mut cfg = SenderConfig::default();
        cfg.network.server_port = 80;
        assert!(matches!(cfg.validate(), Err(FramecastError::PortOutOfRange(80))));
    }

    #[test]
    fn fps_and_quality_are_validated() {
        let mut cfg = SenderConfig::default();
        cfg.stream.fps = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = SenderConfig::default();
        cfg.stream.initial_quality = Some(0);
        assert!(cfg.validate().is_err());

        assert!(SenderConfig::default().validate().is_ok());
    }

    #[test]
    fn source_size_is_bounded() {
        let mut cfg = SenderConfig::default();
        cfg.source.width = u32::MAX;
        assert!(matches!(cfg.validate(), Err(FramecastError::InvalidConfig(_))));

        cfg.source.width = MAX_SOURCE_DIMENSION;
        cfg.source.height = MAX_SOURCE_DIMENSION;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_timeouts_and_buffers_map_to_none() {
        let mut cfg = SenderConfig::default();
        cfg.network.send_timeout_secs = 0;
        cfg.network.send_buffer_bytes = 0;
        let opts = cfg.to_socket_options();
        assert_eq!(opts.io_timeout, None);
        assert_eq!(opts.send_buffer_size, None);
        assert_eq!(opts.recv_buffer_size, Some(1024 * 1024));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SenderConfig::load(&dir.path().join("absent.toml"));
        assert_eq!(cfg.network.server_port, DEFAULT_PORT);
    }

    #[test]
    fn write_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sender.toml");
        SenderConfig::write_default(&path).unwrap();
        let cfg = SenderConfig::load(&path);
        assert_eq!(cfg.stream.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }
}
