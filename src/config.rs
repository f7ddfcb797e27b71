//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub encode: EncodeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rendering session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Content source rendered for the whole session (local HTML file).
    #[serde(default = "default_source")]
    pub source: PathBuf,
    /// Headless browser binary used as the rendering engine.
    #[serde(default = "default_browser_path")]
    pub browser_path: PathBuf,
    /// Rendering surface width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Rendering surface height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            browser_path: default_browser_path(),
            width: default_width(),
            height: default_height(),
        }
    }
}

/// Frame sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Total recording duration in milliseconds.
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Sample interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Directory holding the numbered frame store.
    #[serde(default = "default_frames_dir")]
    pub frames_dir: PathBuf,
    /// Upper bound on a single snapshot (capture + write) in milliseconds.
    #[serde(default = "default_snapshot_timeout_ms")]
    pub snapshot_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_duration_ms(),
            interval_ms: default_interval_ms(),
            frames_dir: default_frames_dir(),
            snapshot_timeout_ms: default_snapshot_timeout_ms(),
        }
    }
}

impl CaptureConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }
}

/// Video encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeConfig {
    /// Encoder binary invoked for the batch encode.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    /// Output frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Intermediate video file produced by the encoder, consumed by commit.
    #[serde(default = "default_work_file")]
    pub work_file: PathBuf,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            fps: default_fps(),
            work_file: default_work_file(),
        }
    }
}

/// Final artifact placement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory scanned for existing `wallpaper-<n>.mp4` artifacts and
    /// receiving the committed output.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_source() -> PathBuf {
    PathBuf::from("index.html")
}

fn default_browser_path() -> PathBuf {
    PathBuf::from("chromium")
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_duration_ms() -> u64 {
    300_000
}

fn default_interval_ms() -> u64 {
    100
}

fn default_frames_dir() -> PathBuf {
    PathBuf::from("./screenshots")
}

fn default_snapshot_timeout_ms() -> u64 {
    10_000
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_fps() -> u32 {
    10
}

fn default_work_file() -> PathBuf {
    PathBuf::from("./wallpaper.mp4")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("wallrec/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.exists() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("WALLREC_SOURCE") {
            self.session.source = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WALLREC_BROWSER") {
            self.session.browser_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WALLREC_DURATION_MS") {
            if let Ok(v) = val.parse() {
                self.capture.duration_ms = v;
            }
        }
        if let Ok(val) = std::env::var("WALLREC_INTERVAL_MS") {
            if let Ok(v) = val.parse() {
                self.capture.interval_ms = v;
            }
        }
        if let Ok(val) = std::env::var("WALLREC_FPS") {
            if let Ok(v) = val.parse() {
                self.encode.fps = v;
            }
        }
        if let Ok(val) = std::env::var("WALLREC_FFMPEG") {
            self.encode.ffmpeg_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WALLREC_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WALLREC_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.session.width == 0 || self.session.height == 0 {
            anyhow::bail!("Surface dimensions must be greater than 0");
        }
        if self.capture.duration_ms == 0 {
            anyhow::bail!("Recording duration must be greater than 0");
        }
        if self.capture.interval_ms == 0 {
            anyhow::bail!("Sample interval must be greater than 0");
        }
        if self.capture.interval_ms > self.capture.duration_ms {
            anyhow::bail!("Sample interval cannot exceed the recording duration");
        }
        if self.encode.fps == 0 {
            anyhow::bail!("Output frame rate must be greater than 0");
        }
        Ok(())
    }
}
