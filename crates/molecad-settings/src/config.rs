//! Configuration and settings management for Molecad
//!
//! Provides configuration file handling and validation. Files are JSON or
//! TOML, chosen by extension.
//!
//! Configuration is organized into logical sections:
//! - Layout search tuning (time budget, rotations, population)
//! - Default sheet sizes per unit system
//! - Undo history depth
//! - Log level

use molecad_geometry::LayoutConfig;
use molecad_graph::{GraphSettings, SheetDefaults};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{SettingsError, SettingsResult};

/// Tuning of the cut-layout search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Wall-clock budget of one search in milliseconds
    pub runtime_ms: u64,
    /// Number of rotations tried per part
    pub rotations: u32,
    pub population_size: usize,
    /// Mutation probability in percent
    pub mutation_rate: u32,
    /// Distance under which points are considered equal
    pub tolerance: f64,
    /// Maximum chord error when arcs are flattened
    pub curve_tolerance: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        let defaults = LayoutConfig::default();
        Self {
            runtime_ms: defaults.runtime.as_millis() as u64,
            rotations: defaults.rotations,
            population_size: defaults.population_size,
            mutation_rate: defaults.mutation_rate,
            tolerance: defaults.tolerance,
            curve_tolerance: defaults.curve_tolerance,
        }
    }
}

/// One stock sheet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetSettings {
    pub width: f64,
    pub height: f64,
    pub part_padding: f64,
}

impl From<SheetDefaults> for SheetSettings {
    fn from(sheet: SheetDefaults) -> Self {
        Self {
            width: sheet.width,
            height: sheet.height,
            part_padding: sheet.part_padding,
        }
    }
}

impl From<SheetSettings> for SheetDefaults {
    fn from(sheet: SheetSettings) -> Self {
        Self {
            width: sheet.width,
            height: sheet.height,
            part_padding: sheet.part_padding,
        }
    }
}

/// Sheet a new Cut Layout starts with, per unit system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    pub metric: SheetSettings,
    pub imperial: SheetSettings,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            metric: SheetDefaults::METRIC.into(),
            imperial: SheetDefaults::IMPERIAL.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Number of edits that can be undone
    pub undo_depth: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { undo_depth: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when RUST_LOG is not set, e.g. "info" or "molecad_graph=debug"
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutSettings,
    pub sheets: SheetsSettings,
    pub history: HistorySettings,
    pub logging: LoggingSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(SettingsError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)?;
        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;
        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let layout = &self.layout;
        if layout.runtime_ms == 0 {
            return Err(SettingsError::invalid("layout.runtime_ms", "must be > 0"));
        }
        if layout.rotations == 0 {
            return Err(SettingsError::invalid("layout.rotations", "must be > 0"));
        }
        if layout.population_size < 2 {
            return Err(SettingsError::invalid(
                "layout.population_size",
                "must be at least 2",
            ));
        }
        if layout.mutation_rate > 100 {
            return Err(SettingsError::invalid(
                "layout.mutation_rate",
                "is a percentage and must be <= 100",
            ));
        }
        if layout.tolerance.is_nan() || layout.tolerance < 0.0 {
            return Err(SettingsError::invalid("layout.tolerance", "must be >= 0"));
        }
        if layout.curve_tolerance.is_nan() || layout.curve_tolerance <= 0.0 {
            return Err(SettingsError::invalid("layout.curve_tolerance", "must be > 0"));
        }

        for (key, sheet) in [
            ("sheets.metric", &self.sheets.metric),
            ("sheets.imperial", &self.sheets.imperial),
        ] {
            if [sheet.width, sheet.height].iter().any(|d| d.is_nan() || *d <= 0.0) {
                return Err(SettingsError::invalid(key, "sheet dimensions must be > 0"));
            }
            if sheet.part_padding.is_nan() || sheet.part_padding < 0.0 {
                return Err(SettingsError::invalid(key, "part padding must be >= 0"));
            }
        }

        if self.logging.level.trim().is_empty() {
            return Err(SettingsError::invalid("logging.level", "must not be empty"));
        }
        Ok(())
    }

    /// Packer tuning; sheet size and units are filled in per Cut Layout atom
    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig {
            runtime: Duration::from_millis(self.layout.runtime_ms),
            rotations: self.layout.rotations,
            population_size: self.layout.population_size,
            mutation_rate: self.layout.mutation_rate,
            tolerance: self.layout.tolerance,
            curve_tolerance: self.layout.curve_tolerance,
            ..LayoutConfig::default()
        }
    }

    /// Settings handed to a project session
    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            undo_depth: self.history.undo_depth,
            layout: self.layout_config(),
            metric_sheet: self.sheets.metric.into(),
            imperial_sheet: self.sheets.imperial.into(),
        }
    }
}
