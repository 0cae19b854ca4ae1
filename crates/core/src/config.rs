use std::fs;
use std::path::{Path, PathBuf};

use looper_engine::EngineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {field} must be non-zero")]
    Invalid { field: &'static str },
}

/// User settings for the looper, stored as TOML.
///
/// Missing keys fall back to their defaults, so a config file only needs to
/// name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LooperConfig {
    /// Used for offline sessions; a device host overrides it.
    pub sample_rate: u32,
    pub channels: usize,
    pub max_block_frames: usize,
    pub command_capacity: usize,
    pub status_capacity: usize,
    pub max_clips: usize,
    pub max_takes: usize,
    pub max_takes_per_clip: usize,
    /// Load each finished recording straight back into its clip.
    pub auto_load_recordings: bool,
}

impl Default for LooperConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            sample_rate: engine.sample_rate,
            channels: engine.channels,
            max_block_frames: engine.max_block_frames,
            command_capacity: engine.command_capacity,
            status_capacity: engine.status_capacity,
            max_clips: engine.max_clips,
            max_takes: engine.max_takes,
            max_takes_per_clip: engine.max_takes_per_clip,
            auto_load_recordings: true,
        }
    }
}

impl LooperConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("looper").join("config.toml"))
    }

    /// Load from the user config directory, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Io(_)) => Self::default(),
            Err(err) => {
                log::warn!("ignoring {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with. Every size and rate has
    /// to be at least one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("sample_rate", self.sample_rate as usize),
            ("channels", self.channels),
            ("max_block_frames", self.max_block_frames),
            ("command_capacity", self.command_capacity),
            ("status_capacity", self.status_capacity),
            ("max_clips", self.max_clips),
            ("max_takes", self.max_takes),
            ("max_takes_per_clip", self.max_takes_per_clip),
        ];
        match fields.into_iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::Invalid { field }),
            None => Ok(()),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Err(err) = self.save_to(&path) {
            log::warn!("could not save config to {}: {err}", path.display());
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            max_block_frames: self.max_block_frames,
            command_capacity: self.command_capacity,
            status_capacity: self.status_capacity,
            max_clips: self.max_clips,
            max_takes: self.max_takes,
            max_takes_per_clip: self.max_takes_per_clip,
        }
    }
}

impl From<&LooperConfig> for EngineConfig {
    fn from(config: &LooperConfig) -> Self {
        config.engine_config()
    }
}
