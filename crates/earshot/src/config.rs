//! Configuration for the earshot player
//!
//! Default values live in the constant modules below. [`Config`] gathers them
//! into a value that is threaded through constructors, and can be overridden
//! from a TOML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PlayerError, Result};

/// Audio-related configuration
pub mod audio {
    /// Sample rate assumed when a decoder does not report one
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

    /// Frames pulled through the analyzer per block
    pub const BLOCK_FRAMES: usize = 512;
}

/// Analysis-related configuration
pub mod analysis {
    /// Number of frequency bands in the banded spectrum
    pub const SPECTRUM_BANDS: usize = 16;

    /// Added to each bin magnitude before `log10` so silence stays finite
    pub const LOG_EPSILON: f32 = 1e-6;

    /// Divisor applied to averaged log magnitudes
    pub const LOG_DIVISOR: f32 = 100.0;

    /// Weight of the left neighbour's previous value when smoothing bands
    pub const SMOOTHING_WEIGHT: f32 = 0.5;
}

/// Player-related configuration
pub mod player {
    /// Directory scanned for music when none is given
    pub const MUSIC_DIR: &str = "./music";

    /// File extensions picked up by discovery (matched case-insensitively)
    pub const EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg"];

    /// Presentation tick interval in milliseconds
    pub const TICK_INTERVAL_MS: u64 = 100;
}

/// Timeout configuration
pub mod timeouts {
    /// Maximum time to wait for format probe (symphonia) in seconds
    pub const PROBE_TIMEOUT_SECS: u64 = 10;
}

/// Name of the per-directory config file
pub const CONFIG_FILE_NAME: &str = "earshot.toml";

/// Which part of a stereo frame is analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisChannel {
    #[default]
    Left,
    Right,
    Mix,
}

/// Block transform settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub bands: usize,
    pub epsilon: f32,
    pub log_divisor: f32,
    pub smoothing_weight: f32,
    pub channel: AnalysisChannel,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bands: analysis::SPECTRUM_BANDS,
            epsilon: analysis::LOG_EPSILON,
            log_divisor: analysis::LOG_DIVISOR,
            smoothing_weight: analysis::SMOOTHING_WEIGHT,
            channel: AnalysisChannel::default(),
        }
    }
}

/// Whole-run configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub music_dir: PathBuf,
    pub extensions: Vec<String>,
    pub block_frames: usize,
    pub default_sample_rate: u32,
    pub tick_interval_ms: u64,
    pub analysis: AnalysisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            music_dir: PathBuf::from(player::MUSIC_DIR),
            extensions: player::EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            block_frames: audio::BLOCK_FRAMES,
            default_sample_rate: audio::DEFAULT_SAMPLE_RATE,
            tick_interval_ms: player::TICK_INTERVAL_MS,
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Config {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| PlayerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlayerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Find a config file: `earshot.toml` in the working directory first,
    /// then `<config_dir>/earshot/config.toml`
    pub fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        let platform = dirs::config_dir()?.join("earshot").join("config.toml");
        platform.exists().then_some(platform)
    }

    /// Presentation tick interval
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.block_frames == 0 {
            return Err(PlayerError::Config("block_frames must be > 0".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(PlayerError::Config("tick_interval_ms must be > 0".into()));
        }
        if self.default_sample_rate == 0 {
            return Err(PlayerError::Config("default_sample_rate must be > 0".into()));
        }
        if self.analysis.bands == 0 {
            return Err(PlayerError::Config("analysis.bands must be > 0".into()));
        }
        if !(self.analysis.log_divisor.is_finite() && self.analysis.log_divisor > 0.0) {
            return Err(PlayerError::Config("analysis.log_divisor must be > 0".into()));
        }
        if !(self.analysis.epsilon.is_finite() && self.analysis.epsilon > 0.0) {
            return Err(PlayerError::Config("analysis.epsilon must be > 0".into()));
        }
        if !(self.analysis.smoothing_weight.is_finite() && self.analysis.smoothing_weight >= 0.0)
        {
            return Err(PlayerError::Config(
                "analysis.smoothing_weight must be >= 0".into(),
            ));
        }
        if self.extensions.is_empty() {
            return Err(PlayerError::Config("extensions must not be empty".into()));
        }
        Ok(())
    }
}
