//! Error handling for Molecad
//!
//! Provides error types for every layer of the engine:
//! - Graph errors (atoms, attachment points, connectors, equations)
//! - Geometry errors (library lookups, kernel operations)
//! - Layout errors (orientation, perimeter chaining, packing)
//! - Project errors (persisted file format)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Graph error type
///
/// Raised by structural operations on the dataflow graph: placing atoms,
/// wiring connectors, and evaluating atom-local expressions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// No factory is registered for the atom type tag
    #[error("Unknown atom type: {atom_type}")]
    UnknownAtomType {
        /// The unrecognised type tag.
        atom_type: String,
    },

    /// Atom is not a child of the molecule being addressed
    #[error("Atom {id} not found")]
    AtomNotFound {
        /// The missing atom's unique id.
        id: String,
    },

    /// Atom exists but has no attachment point of that name
    #[error("Atom {atom} has no attachment point named '{name}'")]
    AttachmentPointNotFound {
        /// The owning atom's unique id.
        atom: String,
        /// The requested attachment point name.
        name: String,
    },

    /// Input already has its single incoming connector
    #[error("Input '{name}' on atom {atom} is already connected")]
    InputAlreadyConnected {
        /// The owning atom's unique id.
        atom: String,
        /// The input name.
        name: String,
    },

    /// Connector would wire an atom to itself
    #[error("Atom {atom} cannot be connected to itself")]
    SelfConnection {
        /// The atom's unique id.
        atom: String,
    },

    /// Operation needs a molecule but the atom is a plain atom
    #[error("Atom {id} is not a molecule")]
    NotAMolecule {
        /// The atom's unique id.
        id: String,
    },

    /// A value of the wrong type reached an attachment point
    #[error("Expected a {expected} value, found {found}")]
    TypeMismatch {
        /// The expected value type.
        expected: String,
        /// The value type actually received.
        found: String,
    },

    /// Equation text could not be parsed or evaluated
    #[error("Equation error: {reason}")]
    Equation {
        /// The reason parsing or evaluation failed.
        reason: String,
    },

    /// Generic graph error
    #[error("Graph error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Layout error type
///
/// Raised by the cut-layout pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// A part has no planar face it could be cut from
    #[error("Upstream object uncuttable, has no flat face")]
    NoFlatFace,

    /// The outline of a face could not be chained into a closed loop
    #[error("Geometry error when preparing for cutlayout. Part perimiter has an edge with: {continuations} continuations")]
    PerimeterChain {
        /// Number of candidate continuations found for the dangling endpoint.
        continuations: usize,
    },

    /// A point with a NaN or infinite coordinate reached the packer
    #[error("Part outline contains a non-finite point")]
    NonFinitePoint,

    /// Sheet dimensions cannot hold anything
    #[error("Invalid sheet size {width} x {height}")]
    InvalidSheet {
        /// Sheet width.
        width: f64,
        /// Sheet height.
        height: f64,
    },

    /// The packer could not place a single part
    #[error("Failed to place any parts. Are sheet dimensions right?")]
    NothingPlaced,

    /// The search budget elapsed without any candidate layout
    #[error("Failed to find placements within the time limit.")]
    TimeLimit,

    /// The caller cancelled before any candidate layout existed
    #[error("Layout cancelled")]
    Cancelled,

    /// The target was written by a newer request while the search ran
    #[error("Layout result discarded, its target was replaced by a newer result")]
    Superseded,
}

/// Geometry error type
///
/// Raised by the geometry service when an operation is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// No library entry is stored under the id
    #[error("Geometry with ID {id} not found in library")]
    NotFound {
        /// The missing library key.
        id: String,
    },

    /// A dimension argument is not usable
    #[error("Invalid {parameter} for {operation}: {value}")]
    InvalidDimension {
        /// The operation being performed.
        operation: String,
        /// The offending parameter.
        parameter: String,
        /// The value received.
        value: f64,
    },

    /// Inputs of a binary operation do not match
    #[error("{reason}")]
    IncompatibleInputs {
        /// Why the inputs cannot be combined.
        reason: String,
    },

    /// No part carries the requested tag
    #[error("Tag not found: {tag}")]
    TagNotFound {
        /// The tag that was searched for.
        tag: String,
    },

    /// Nothing is connected to an output
    #[error("Nothing is connected to the output")]
    NothingConnected,

    /// A boolean operation failed in the kernel
    #[error("Boolean operation failed: {reason}")]
    Boolean {
        /// The reason the boolean failed.
        reason: String,
    },

    /// Layout pipeline error
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The geometry worker has shut down
    #[error("Geometry service is not running")]
    ServiceUnavailable,
}

/// Project error type
///
/// Raised while reading persisted project documents.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectError {
    /// The document declares a file type version this build cannot read
    #[error("Unsupported project file version {version}")]
    UnsupportedVersion {
        /// The declared version.
        version: u32,
    },

    /// The document is not valid project JSON
    #[error("Malformed project document: {reason}")]
    Malformed {
        /// The parse failure.
        reason: String,
    },
}

/// Main error type for Molecad
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Graph error
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Geometry error
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Layout error
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Project error
    #[error(transparent)]
    Project(#[from] ProjectError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a layout error, including one surfaced by the geometry service
    pub fn is_layout_error(&self) -> bool {
        matches!(
            self,
            Error::Layout(_) | Error::Geometry(GeometryError::Layout(_))
        )
    }

    /// Check if this is a structural graph error
    pub fn is_graph_error(&self) -> bool {
        matches!(self, Error::Graph(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
