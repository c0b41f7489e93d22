use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::analyzer::decode::ANALYSIS_SAMPLE_RATE;
use crate::analyzer::linear::LinearRange;
use crate::analyzer::psd::PsdFloor;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Directory of audio clips (used when no `--audio-dir` is given).
    pub audio_dir: Option<PathBuf>,
    /// Directory of `<stem>.key` label files.
    pub key_dir: Option<PathBuf>,
    /// Pitch-class dataset path (overrides the XDG default).
    pub dataset_path: Option<PathBuf>,
    /// Linear-bin dataset path (overrides the XDG default).
    pub linear_dataset_path: Option<PathBuf>,
    pub extract: ExtractConfig,
    pub psd: PsdFloor,
    pub linear: LinearRange,
}

/// Harmonic extraction settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Separation margin for the pitch-class pipeline.
    pub pitch_margin: f64,
    /// Separation margin for the linear-bin pipeline.
    pub linear_margin: f64,
    /// Rate audio is resampled to before analysis.
    pub sample_rate: u32,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            pitch_margin: 3.0,
            linear_margin: 2.0,
            sample_rate: ANALYSIS_SAMPLE_RATE,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/pitchbin/config.toml`, or from `explicit`
    /// when given. Returns default config if the file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load(explicit: Option<&Path>) -> Self {
        let config_path = explicit.map(Path::to_path_buf).or_else(Self::config_path);
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Some(path) if explicit.is_some() => {
                log::warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve a default dataset path in the XDG data directory.
pub fn default_dataset_path(file_name: &str) -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join(file_name)
    } else {
        // Fallback: current directory
        PathBuf::from(file_name)
    }
}
