//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default export settings.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Extra directory searched for `.cube` files referenced by name.
    #[serde(default)]
    pub luts_dir: Option<PathBuf>,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDefaults {
    /// Output frame rate.
    pub fps: u32,

    /// Quality preset name (`low`, `medium`, `high`, `custom`).
    pub quality: String,

    /// Frame acquisition strategy (`realtime`, `deterministic`, `auto`).
    pub strategy: String,

    /// Playback rate used by the realtime strategy.
    pub realtime_playback_rate: f64,

    /// Yield to the host scheduler every N frames.
    pub yield_every_frames: u32,

    /// Encoder backend (`h264`, `y4m`).
    pub codec: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "lumagrade=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            quality: "high".to_string(),
            strategy: "auto".to_string(),
            realtime_playback_rate: 1.3,
            yield_every_frames: 4,
            codec: "h264".to_string(),
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
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("lumagrade").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"luts_dir": "/opt/luts"}"#).unwrap();
        assert_eq!(config.export.fps, 30);
        assert_eq!(config.export.yield_every_frames, 4);
        assert!((config.export.realtime_playback_rate - 1.3).abs() < 1e-9);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.luts_dir, Some(PathBuf::from("/opt/luts")));
    }

    #[test]
    fn test_config_path_ends_with_app_dir() {
        let path = config_file_path();
        assert!(path.ends_with("lumagrade/config.json"));
    }
}
