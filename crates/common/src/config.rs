//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CollageError, CollageResult};

/// Global application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where exported collages are written before commit.
    pub output_dir: PathBuf,

    /// Durable media library the finished collage is committed to.
    pub library_dir: PathBuf,

    /// Collage geometry.
    pub layout: LayoutDefaults,

    /// Export engine settings.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Geometry constants for the stacked layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutDefaults {
    /// Output frame width in pixels.
    pub frame_width: u32,

    /// Output frame height in pixels.
    pub frame_height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Source resolution the fixed scale factors are derived from.
    pub reference_source_width: u32,
    pub reference_source_height: u32,

    /// Band height override. Defaults to `frame_height / 3`.
    pub band_height: Option<u32>,

    /// Vertical distance between band origins. Defaults to the band height.
    pub band_stride: Option<u32>,

    /// Use the original 1080x720 @ 610px stacking constants.
    pub legacy: bool,
}

/// Export engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Progress sampling cadence in milliseconds.
    pub progress_interval_ms: u64,

    /// How long a cancelled worker may take to stop before it is aborted.
    pub cancel_grace_ms: u64,

    /// ffmpeg executable.
    pub ffmpeg_binary: String,

    /// ffprobe executable.
    pub ffprobe_binary: String,

    /// Video encoder.
    pub video_codec: String,

    /// Encoder speed/quality preset.
    pub preset: String,

    /// Constant rate factor.
    pub crf: u8,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tristack=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("tristack"),
            library_dir: default_library_dir(),
            layout: LayoutDefaults::default(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LayoutDefaults {
    fn default() -> Self {
        Self {
            frame_width: 1080,
            frame_height: 1920,
            fps: 30,
            reference_source_width: 1920,
            reference_source_height: 1080,
            band_height: None,
            band_stride: None,
            legacy: false,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            progress_interval_ms: 100,
            cancel_grace_ms: 2000,
            ffmpeg_binary: "ffmpeg".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> CollageResult<Self> {
        if !path.exists() {
            return Err(CollageError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| CollageError::config(format!("{}: {e}", path.display())))
    }

    /// Save config to the standard location.
    pub fn save(&self) -> CollageResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> CollageResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("tristack").join("config.json")
}

/// Default media library directory.
fn default_library_dir() -> PathBuf {
    let base = std::env::var("XDG_VIDEOS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join("Videos"));
    base.join("TriStack")
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_product_constants() {
        let config = AppConfig::default();
        assert_eq!(config.layout.frame_width, 1080);
        assert_eq!(config.layout.frame_height, 1920);
        assert_eq!(config.layout.fps, 30);
        assert_eq!(config.export.progress_interval_ms, 100);
        assert_eq!(config.export.preset, "medium");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.layout.legacy = true;
        config.export.crf = 28;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"layout": {"fps": 24}}"#).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.layout.fps, 24);
        assert_eq!(loaded.layout.frame_height, 1920);
        assert_eq!(loaded.export.ffmpeg_binary, "ffmpeg");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = AppConfig::load_from(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, CollageError::FileNotFound { .. }));
    }
}
