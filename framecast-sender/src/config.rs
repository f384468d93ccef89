//! Configuration for the sender.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::pipeline::pacer::frame_interval;
use framecast_core::{
    CaptureRegion, ConnectionInfo, EncodeFormat, EncoderConfig, PacingMode, SourceKind,
    SourceOptions, StreamConfig, StreamError,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Where to send frames.
    pub network: NetworkConfig,
    /// What to capture.
    pub capture: CaptureConfig,
    /// Frame rate and stop behaviour.
    pub stream: StreamSection,
    /// Image encoding.
    pub encode: EncodeConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Receiver host name or IP address.
    pub host: String,
    /// Receiver TCP port.
    pub port: u16,
    /// Bound on name resolution plus connect, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Bound on each frame write in milliseconds. 0 disables the bound.
    pub send_timeout_ms: u64,
}

/// Capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Backend: "screen", "camera", "file" or "pattern".
    pub source: SourceKind,
    /// Image path for the "file" source.
    pub file: String,
    /// Device index for the "camera" source.
    pub camera_index: u32,
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
    /// How long the screen source waits for a new frame, in milliseconds.
    pub capture_timeout_ms: u64,
}

/// Streaming behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    /// Target frames per second.
    pub fps: f64,
    /// "deadline" or "fixed-delay".
    pub pacing: PacingMode,
    /// Stop cleanly when standard input reaches end-of-file.
    pub stop_on_stdin_eof: bool,
}

/// Encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// "png" or "jpeg".
    pub format: EncodeFormat,
    /// JPEG quality 0..=100.
    pub quality: u8,
    /// Output width; 0 together with `resize_height = 0` keeps the capture size.
    pub resize_width: u32,
    pub resize_height: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 12345,
            connect_timeout_ms: 5000,
            send_timeout_ms: 0,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let region = CaptureRegion::default();
        Self {
            source: SourceKind::Screen,
            file: String::new(),
            camera_index: 0,
            top: region.top,
            left: region.left,
            width: region.width,
            height: region.height,
            capture_timeout_ms: 100,
        }
    }
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            fps: 30.0,
            pacing: PacingMode::Deadline,
            stop_on_stdin_eof: false,
        }
    }
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            format: EncodeFormat::Png,
            quality: 80,
            resize_width: 0,
            resize_height: 0,
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

    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(self.network.host.clone(), self.network.port)
    }

    pub fn region(&self) -> CaptureRegion {
        let c = &self.capture;
        CaptureRegion::new(c.top, c.left, c.width, c.height)
    }

    /// Path for the file source, if one is configured.
    pub fn source_path(&self) -> Option<PathBuf> {
        (!self.capture.file.is_empty()).then(|| PathBuf::from(&self.capture.file))
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture.capture_timeout_ms)
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            region: self.region(),
            file: self.source_path(),
            camera_index: self.capture.camera_index,
            timeout: self.capture_timeout(),
        }
    }

    /// Convert into the core session configuration, rejecting values the
    /// pipeline cannot run with.
    pub fn to_stream_config(&self) -> Result<StreamConfig, StreamError> {
        frame_interval(self.stream.fps)?;

        if self.encode.quality > 100 {
            return Err(StreamError::InvalidConfig(format!(
                "encode.quality must be 0..=100, got {}",
                self.encode.quality
            )));
        }

        let resize_to = match (self.encode.resize_width, self.encode.resize_height) {
            (0, 0) => None,
            (w, h) if w > 0 && h > 0 => Some((w, h)),
            (w, h) => {
                return Err(StreamError::InvalidConfig(format!(
                    "resize needs both dimensions, got {w}x{h}"
                )));
            }
        };

        if self.network.connect_timeout_ms == 0 {
            return Err(StreamError::InvalidConfig(
                "network.connect_timeout_ms must be > 0".into(),
            ));
        }

        Ok(StreamConfig {
            target_fps: self.stream.fps,
            pacing: self.stream.pacing,
            encoder: EncoderConfig {
                format: self.encode.format,
                quality: self.encode.quality,
                resize_to,
            },
            connect_timeout: Duration::from_millis(self.network.connect_timeout_ms),
            send_timeout: match self.network.send_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&SenderConfig::default()).unwrap();
        assert!(text.contains("host = \"localhost\""));
        assert!(text.contains("pacing = \"deadline\""));
        assert!(text.contains("format = \"png\""));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&SenderConfig::default()).unwrap();
        let parsed: SenderConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 12345);
        assert_eq!(parsed.stream.fps, 30.0);
        assert_eq!(parsed.region(), CaptureRegion::new(160, 160, 160, 135));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: SenderConfig = toml::from_str(
            r#"
            [capture]
            source = "pattern"
            width = 64

            [encode]
            format = "jpeg"
            resize_width = 32
            resize_height = 18

            [stream]
            pacing = "fixed-delay"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.capture.source, SourceKind::Pattern);
        assert_eq!(parsed.capture.width, 64);
        assert_eq!(parsed.capture.height, 135);
        assert_eq!(parsed.network.host, "localhost");

        let cfg = parsed.to_stream_config().unwrap();
        assert_eq!(cfg.encoder.format, EncodeFormat::Jpeg);
        assert_eq!(cfg.encoder.resize_to, Some((32, 18)));
        assert_eq!(cfg.pacing, PacingMode::FixedDelay);
    }

    #[test]
    fn to_stream_config_defaults() {
        let cfg = SenderConfig::default().to_stream_config().unwrap();
        assert_eq!(cfg.target_fps, 30.0);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.send_timeout, None);
        assert_eq!(cfg.encoder.resize_to, None);
    }

    #[test]
    fn to_stream_config_rejects_bad_values() {
        let mut cfg = SenderConfig::default();
        cfg.stream.fps = 0.0;
        assert_eq!(cfg.to_stream_config().unwrap_err().kind(), "InvalidConfig");

        let mut cfg = SenderConfig::default();
        cfg.encode.quality = 101;
        assert!(cfg.to_stream_config().is_err());

        let mut cfg = SenderConfig::default();
        cfg.encode.resize_width = 640;
        assert!(cfg.to_stream_config().is_err());
    }

    #[test]
    fn load_falls_back_on_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sender.toml");
        std::fs::write(&path, "network = 5").unwrap();
        assert_eq!(SenderConfig::load(&path).network.port, 12345);

        SenderConfig::write_default(&path).unwrap();
        assert_eq!(SenderConfig::load(&path).capture.capture_timeout_ms, 100);
    }

    #[test]
    fn camera_source_options() {
        let parsed: SenderConfig = toml::from_str(
            r#"
            [capture]
            source = "camera"
            camera_index = 2
            "#,
        )
        .unwrap();
        assert_eq!(parsed.capture.source, SourceKind::Camera);
        let options = parsed.source_options();
        assert_eq!(options.camera_index, 2);
        assert_eq!(options.region, CaptureRegion::default());
        assert!(options.file.is_none());
    }

    #[test]
    fn empty_file_path_is_none() {
        let mut cfg = SenderConfig::default();
        assert!(cfg.source_path().is_none());
        cfg.capture.file = "desk.png".into();
        assert_eq!(cfg.source_path(), Some(PathBuf::from("desk.png")));
    }
}
