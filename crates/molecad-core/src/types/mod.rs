//! Type system utilities.
//!
//! ## Modules
//!
//! - [`ids`]: The opaque identifier shared by atoms and geometry library entries.

pub mod ids;

pub use ids::*;
