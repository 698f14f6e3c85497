//! Settings Persistence
//!
//! Locates the settings file in the platform configuration directory and
//! loads it, falling back to defaults when it does not exist yet.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::SettingsError;

const APP_DIR: &str = "molecad";
const SETTINGS_FILE: &str = "settings.toml";

/// Settings persistence layer
#[derive(Debug, Clone)]
pub struct SettingsPersistence {
    path: PathBuf,
    config: Config,
}

impl SettingsPersistence {
    /// `<config dir>/molecad/settings.toml`
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
            .ok_or(SettingsError::NoConfigDirectory)
    }

    /// Load settings from `path`; a missing file yields the defaults
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = if path.exists() {
            let config = Config::load_from_file(&path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?;
            info!("Loaded settings from {}", path.display());
            config
        } else {
            debug!("No settings at {}, using defaults", path.display());
            Config::default()
        };
        Ok(Self { path, config })
    }

    /// Load from the default location, or use defaults when there is none
    pub fn open_default() -> Result<Self> {
        match Self::default_path() {
            Ok(path) => Self::open(path),
            Err(err) => {
                warn!("{}", err);
                Ok(Self {
                    path: PathBuf::from(SETTINGS_FILE),
                    config: Config::default(),
                })
            }
        }
    }

    /// Save settings, creating the parent directory if needed
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        self.config
            .save_to_file(&self.path)
            .with_context(|| format!("Failed to save settings to {}", self.path.display()))?;
        info!("Saved settings to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get reference to config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable reference to config
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }
}
