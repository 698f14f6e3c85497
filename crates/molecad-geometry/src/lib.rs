//! # Molecad Geometry
//!
//! The geometry service consumed by the graph engine: a prismatic modelling
//! kernel, the keyed library of results, the asynchronous worker owning that
//! library, and the cut-layout nesting pipeline.

pub mod kernel;
pub mod layout;
pub mod library;
pub mod mesh;
pub mod model;
pub mod service;

pub use kernel::{BoundingBox, Contour, Face, FaceKind, Profile, Shape, ShapeKind};
pub use layout::{
    CancelHandle, LayoutConfig, LayoutEvent, LayoutOutcome, Placement, Sheets, Translate,
};
pub use library::GeometryLibrary;
pub use mesh::DisplayMesh;
pub use model::{BomEntry, GeometryNode, Part, DEFAULT_COLOR};
pub use service::{GeometryHandle, GeometryReply, GeometryRequest, GeometryService, GeometryWorker};
