//! Receiver configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use framecast_core::{DEFAULT_MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, StreamError};

/// Top-level configuration for the receiver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// What to do with received frames.
    pub output: OutputConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on.
    pub bind: String,
    pub port: u16,
    /// Largest payload accepted before the session is dropped.
    pub max_frame_bytes: usize,
    /// Exit after the first producer disconnects.
    pub once: bool,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for `frame-NNNNNN.<ext>` files. Empty disables writing.
    pub dir: String,
    /// Decode each payload and count the ones that are not valid images.
    pub verify_images: bool,
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
            bind: "0.0.0.0".into(),
            port: 12345,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            once: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: String::new(),
            verify_images: true,
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

impl ReceiverConfig {
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

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// `bind:port`, ready for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind, self.network.port)
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        (!self.output.dir.is_empty()).then(|| PathBuf::from(&self.output.dir))
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        let max = self.network.max_frame_bytes;
        if max == 0 || max > MAX_PAYLOAD_SIZE {
            return Err(StreamError::InvalidConfig(format!(
                "network.max_frame_bytes must be 1..={MAX_PAYLOAD_SIZE}, got {max}"
            )));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
