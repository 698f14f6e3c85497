//! # Molecad Core
//!
//! Core types shared by every Molecad crate: the error taxonomy, project
//! units, unique identifiers, and the session event bus.

pub mod error;
pub mod event_bus;
pub mod types;
pub mod units;

pub use error::{Error, GeometryError, GraphError, LayoutError, ProjectError, Result};

pub use event_bus::{
    AlertEvent, EventBus, EventBusConfig, EventCategory, EventFilter, GraphEvent, ProgressEvent,
    ProjectEvent, RenderEvent, SelectionEvent, SubscriptionId,
};

pub use types::UniqueId;
pub use units::Units;
