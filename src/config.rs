// SPDX-License-Identifier: GPL-3.0-only

//! Session configuration
//!
//! Stored as JSON under the user's config directory. A missing or broken file
//! never prevents the session from starting; defaults are used instead.

use crate::constants::{DualShotBudget, timing};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "camera-session";

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera opened on first load (e.g. "back")
    pub initial_camera: String,
    /// Allow still capture while recording
    pub dual_shutter: bool,
    /// Whether dual-shutter stills count against the recording size limit
    pub dual_shot_budget: DualShotBudget,
    /// Clear the filmstrip whenever the camera is torn down (lock screen use)
    pub secure_mode: bool,
    /// Focused/Failed indicator hold in milliseconds
    pub focus_hold_ms: u64,
    /// Upper bound for the recording stop issued by teardown, in milliseconds
    pub stop_timeout_ms: u64,
    /// Where persisted artifacts go (defaults to the pictures directory)
    pub output_dir: Option<PathBuf>,
    /// Where in-progress recordings are written (defaults to the system temp dir)
    pub temp_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_camera: "back".to_string(),
            dual_shutter: true,
            dual_shot_budget: DualShotBudget::default(),
            secure_mode: false,
            focus_hold_ms: timing::FOCUS_RESET_DELAY_MS,
            stop_timeout_ms: timing::STOP_TIMEOUT_MS,
            output_dir: None,
            temp_dir: None,
        }
    }
}

/// Errors reading or validating the config file
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

impl Config {
    /// Location of the config file, if the platform has a config dir
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the user config, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            debug!("No config directory, using defaults");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigFileError> {
        if self.initial_camera.trim().is_empty() {
            return Err(ConfigFileError::Invalid("initial_camera must not be empty"));
        }
        if self.stop_timeout_ms == 0 {
            return Err(ConfigFileError::Invalid("stop_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn focus_hold(&self) -> Duration {
        Duration::from_millis(self.focus_hold_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Output directory, falling back to the pictures directory
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::picture_dir)
            .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{ "secure_mode": true }"#).unwrap();
        assert!(config.secure_mode);
        assert_eq!(config.initial_camera, "back");
        assert_eq!(config.focus_hold(), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            stop_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigFileError::Invalid(_))));
    }
}
