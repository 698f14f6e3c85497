//! # Event Bus Module
//!
//! Publish/subscribe notifications from the graph engine to whatever is
//! watching it: selection changes, render requests, per-atom alerts,
//! census/layout progress, and project lifecycle events.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use molecad_core::event_bus::{EventBus, EventCategory, EventFilter, GraphEvent};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Alert]),
//!     |event| {
//!         if let GraphEvent::Alert(alert) = event {
//!             println!("{:?}", alert);
//!         }
//!     },
//! );
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
