//! Error types for the settings crate.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    /// A value failed validation; `key` is the dotted path, e.g. `layout.rotations`
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Unsupported settings file extension '{0}', expected .toml or .json")]
    UnsupportedFormat(String),

    #[error("No configuration directory on this platform")]
    NoConfigDirectory,

    #[error("Settings file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed JSON settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed TOML settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Settings cannot be written as TOML: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

impl SettingsError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the file was read but its values were rejected
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Self::InvalidSetting { .. })
    }
}

pub type SettingsResult<T> = Result<T, SettingsError>;
