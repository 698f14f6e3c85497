//! Per-session context handed to every graph operation.

use molecad_core::{EventBus, Units};
use molecad_geometry::{GeometryService, LayoutConfig};
use std::sync::Arc;

/// Default sheet for a unit system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetDefaults {
    pub width: f64,
    pub height: f64,
    pub part_padding: f64,
}

impl SheetDefaults {
    pub const METRIC: SheetDefaults = SheetDefaults {
        width: 1219.0,
        height: 2438.0,
        part_padding: 6.0,
    };

    pub const IMPERIAL: SheetDefaults = SheetDefaults {
        width: 48.0,
        height: 96.0,
        part_padding: 0.25,
    };
}

/// Tunables the graph reads from application settings
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSettings {
    pub undo_depth: usize,
    /// Packer tuning; sheet size and units are filled in per atom
    pub layout: LayoutConfig,
    pub metric_sheet: SheetDefaults,
    pub imperial_sheet: SheetDefaults,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            undo_depth: 5,
            layout: LayoutConfig::default(),
            metric_sheet: SheetDefaults::METRIC,
            imperial_sheet: SheetDefaults::IMPERIAL,
        }
    }
}

impl GraphSettings {
    pub fn environment(&self, units: Units) -> Environment {
        Environment {
            units,
            layout: self.layout.clone(),
            sheet: match units {
                Units::Inches => self.imperial_sheet,
                _ => self.metric_sheet,
            },
        }
    }
}

/// What an atom may know about the project while it computes
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub units: Units,
    pub layout: LayoutConfig,
    pub sheet: SheetDefaults,
}

impl Default for Environment {
    fn default() -> Self {
        GraphSettings::default().environment(Units::Millimeters)
    }
}

/// Services shared by one project session
#[derive(Clone)]
pub struct GraphContext {
    pub service: Arc<dyn GeometryService>,
    pub bus: Arc<EventBus>,
    pub settings: GraphSettings,
}

impl GraphContext {
    pub fn new(service: Arc<dyn GeometryService>, bus: Arc<EventBus>) -> Self {
        Self {
            service,
            bus,
            settings: GraphSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: GraphSettings) -> Self {
        self.settings = settings;
        self
    }
}
