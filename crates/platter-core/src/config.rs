//! Engine configuration
//!
//! The sample and track lists are fixed configuration, not session state:
//! nothing here is written back at runtime. The YAML helpers follow the
//! usual contract - a missing file yields defaults, a malformed file logs
//! a warning and yields defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ordered platter sample base paths (extension-less; .mp3/.wav tried)
    pub platter_samples: Vec<String>,

    /// Ordered music track base paths
    pub music_tracks: Vec<String>,

    /// Scratch response scaling applied after normalization
    pub scratch_sensitivity: f32,

    /// Input units (e.g. degrees per control step) per unity playback rate.
    /// 1.0 means raw input deltas feed the sensitivity directly.
    pub unity_rate_normalization: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            platter_samples: vec![
                "sounds/haahhh".to_string(),
                "sounds/sample1".to_string(),
                "sounds/sample2".to_string(),
            ],
            music_tracks: vec!["tracks/trackA".to_string(), "tracks/trackB".to_string()],
            scratch_sensitivity: 0.17,
            unity_rate_normalization: 1.0,
        }
    }
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config. If the file exists
/// but is invalid, logs a warning and returns default config.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("Config {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => {
                log::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("Failed to parse config: {}, using defaults", e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read config file: {}, using defaults", e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;
    Ok(())
}
