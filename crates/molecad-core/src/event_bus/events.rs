//! Event type definitions for the event bus.
//!
//! Events emitted by the graph engine, organized by category. The engine
//! never talks to a canvas directly; renderers and panels subscribe here.

use serde::{Deserialize, Serialize};

use crate::types::UniqueId;

/// Root event enum for all graph events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphEvent {
    /// Selection changes inside the current molecule
    Selection(SelectionEvent),
    /// Requests to redraw an atom's geometry
    Render(RenderEvent),
    /// Per-atom alerts and warnings
    Alert(AlertEvent),
    /// Census and long-running job progress
    Progress(ProgressEvent),
    /// Project lifecycle and navigation
    Project(ProjectEvent),
}

impl GraphEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            GraphEvent::Selection(_) => EventCategory::Selection,
            GraphEvent::Render(_) => EventCategory::Render,
            GraphEvent::Alert(_) => EventCategory::Alert,
            GraphEvent::Progress(_) => EventCategory::Progress,
            GraphEvent::Project(_) => EventCategory::Project,
        }
    }

    /// The atom this event is about, when it concerns a single atom
    pub fn atom(&self) -> Option<&UniqueId> {
        match self {
            GraphEvent::Render(RenderEvent::Requested { id }) => Some(id),
            GraphEvent::Alert(
                AlertEvent::Raised { atom, .. }
                | AlertEvent::Cleared { atom }
                | AlertEvent::Warning { atom, .. },
            ) => Some(atom),
            GraphEvent::Progress(ProgressEvent::Layout { atom, .. }) => Some(atom),
            _ => None,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            GraphEvent::Selection(e) => e.description(),
            GraphEvent::Render(e) => e.description(),
            GraphEvent::Alert(e) => e.description(),
            GraphEvent::Progress(e) => e.description(),
            GraphEvent::Project(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Selection events.
    Selection,
    /// Render request events.
    Render,
    /// Alert and warning events.
    Alert,
    /// Progress events.
    Progress,
    /// Project lifecycle events.
    Project,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Selection => write!(f, "Selection"),
            EventCategory::Render => write!(f, "Render"),
            EventCategory::Alert => write!(f, "Alert"),
            EventCategory::Progress => write!(f, "Progress"),
            EventCategory::Project => write!(f, "Project"),
        }
    }
}

/// Selection-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectionEvent {
    /// The set of selected atoms changed.
    Changed {
        /// Ids of the atoms now selected.
        selected: Vec<UniqueId>,
    },
}

impl SelectionEvent {
    fn description(&self) -> String {
        match self {
            SelectionEvent::Changed { selected } => {
                format!("Selection changed ({} atoms)", selected.len())
            }
        }
    }
}

/// Render-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderEvent {
    /// The geometry stored under this id should be displayed.
    Requested {
        /// Library key of the geometry to draw.
        id: UniqueId,
    },
}

impl RenderEvent {
    fn description(&self) -> String {
        match self {
            RenderEvent::Requested { id } => format!("Render requested for {}", id),
        }
    }
}

/// Alert-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlertEvent {
    /// An atom failed to compute; its output stays blocked.
    Raised {
        /// The failing atom.
        atom: UniqueId,
        /// Human-readable error.
        message: String,
    },
    /// An atom computed successfully after an earlier alert.
    Cleared {
        /// The recovered atom.
        atom: UniqueId,
    },
    /// Non-blocking warning attached to an atom.
    Warning {
        /// The atom the warning concerns.
        atom: UniqueId,
        /// Human-readable warning.
        message: String,
    },
}

impl AlertEvent {
    fn description(&self) -> String {
        match self {
            AlertEvent::Raised { atom, message } => format!("Alert on {}: {}", atom, message),
            AlertEvent::Cleared { atom } => format!("Alert cleared on {}", atom),
            AlertEvent::Warning { atom, message } => format!("Warning on {}: {}", atom, message),
        }
    }
}

/// Progress-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// Atom counts for the whole project.
    Census {
        /// Atoms in the project.
        total: usize,
        /// Atoms with a computation in flight.
        to_process: usize,
    },
    /// Progress of a long-running layout search.
    Layout {
        /// The CutLayout atom running the search.
        atom: UniqueId,
        /// Fraction complete in `0.0..=1.0`.
        fraction: f64,
    },
}

impl ProgressEvent {
    fn description(&self) -> String {
        match self {
            ProgressEvent::Census { total, to_process } => {
                format!("Census: {}/{} remaining", to_process, total)
            }
            ProgressEvent::Layout { atom, fraction } => {
                format!("Layout {} at {:.0}%", atom, fraction * 100.0)
            }
        }
    }
}

/// Project lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectEvent {
    /// A project document was loaded.
    Loaded {
        /// Number of atoms in the top-level molecule.
        atoms: usize,
    },
    /// The project was serialized.
    Saved,
    /// An undo snapshot was restored.
    UndoApplied {
        /// Kind of operation that was undone.
        operation: String,
    },
    /// An undo snapshot could not be restored; the graph is unchanged.
    UndoFailed {
        /// Why restoring failed.
        reason: String,
    },
    /// The displayed molecule changed.
    Navigated {
        /// Path of molecule ids from the top level; empty for the top level.
        path: Vec<UniqueId>,
    },
}

impl ProjectEvent {
    fn description(&self) -> String {
        match self {
            ProjectEvent::Loaded { atoms } => format!("Project loaded ({} atoms)", atoms),
            ProjectEvent::Saved => "Project saved".to_string(),
            ProjectEvent::UndoApplied { operation } => format!("Undid {}", operation),
            ProjectEvent::UndoFailed { reason } => format!("Undo failed: {}", reason),
            ProjectEvent::Navigated { path } => format!("Navigated to depth {}", path.len()),
        }
    }
}
