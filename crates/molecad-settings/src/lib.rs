//! Molecad Settings Crate
//!
//! Handles application configuration and its persistence.

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{
    Config, HistorySettings, LayoutSettings, LoggingSettings, SheetSettings, SheetsSettings,
};
pub use error::{SettingsError, SettingsResult};
pub use persistence::SettingsPersistence;
