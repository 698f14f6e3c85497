//! # Molecad Graph
//!
//! The dataflow engine behind a Molecad project. Atoms are nodes with typed
//! inputs and one output, connectors wire an output to an input, and
//! molecules are atoms that hold a graph of their own. Changing an input
//! locks everything downstream, recomputes what can be recomputed, and
//! queues geometry work for the geometry service.
//!
//! [`Project`] is the entry point: it loads and saves project documents,
//! applies user edits, keeps the undo history, and drives the geometry jobs.

pub mod atom;
pub mod atoms;
pub mod attachment_point;
pub mod bom;
pub mod connector;
pub mod context;
pub mod equation;
pub mod history;
pub mod molecule;
pub mod naming;
mod propagation;
pub mod project;
pub mod registry;
pub mod serialization;
pub mod session;
pub mod value;

pub use atom::{Atom, AtomBehavior, AtomState, Census, Computation};
pub use attachment_point::{AttachmentPoint, Direction};
pub use bom::{compile_bom, format_bom};
pub use connector::{Connector, ConnectorId, ConnectorRecord};
pub use context::{Environment, GraphContext, GraphSettings, SheetDefaults};
pub use molecule::Molecule;
pub use project::Project;
pub use registry::AtomType;
pub use serialization::{AtomRecord, FILE_TYPE_VERSION};
pub use session::{compute_layouts, cut_layouts, problems};
pub use value::{Value, ValueType};
