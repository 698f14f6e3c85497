//! Project units
//!
//! A project is drawn in one of three unit systems. The persisted key
//! (`"MM"`, `"Inches"`, `"Unitless"`) is what project files store in `unitsKey`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimetres per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Unit system of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Units {
    /// Millimetres
    #[default]
    #[serde(rename = "MM")]
    Millimeters,
    /// Inches
    #[serde(rename = "Inches")]
    Inches,
    /// No physical unit
    #[serde(rename = "Unitless")]
    Unitless,
}

impl Units {
    /// Key used in persisted project files
    pub fn key(&self) -> &'static str {
        match self {
            Self::Millimeters => "MM",
            Self::Inches => "Inches",
            Self::Unitless => "Unitless",
        }
    }

    /// Thickest stock a cut part can plausibly be made of
    pub fn plausible_stock_ceiling(&self) -> f64 {
        match self {
            Self::Inches => 1.0,
            _ => MM_PER_INCH,
        }
    }

    /// Convert a length in these units to millimetres
    pub fn to_mm(&self, value: f64) -> f64 {
        match self {
            Self::Inches => value * MM_PER_INCH,
            _ => value,
        }
    }

    /// Convert a length in millimetres to these units
    pub fn from_mm(&self, value_mm: f64) -> f64 {
        match self {
            Self::Inches => value_mm / MM_PER_INCH,
            _ => value_mm,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mm" | "millimeters" | "metric" => Ok(Self::Millimeters),
            "inches" | "inch" | "in" | "imperial" => Ok(Self::Inches),
            "unitless" | "none" => Ok(Self::Unitless),
            _ => Err(format!("Unknown units: {}", s)),
        }
    }
}
