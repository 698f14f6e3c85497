//! Prismatic modelling kernel.
//!
//! Sketches are planar regions with holes; solids are sketches swept along
//! their normal. This is enough for the primitives, transforms, through-cut
//! differences and flat-part layout the graph needs.

mod face;
pub mod polygon;
mod profile;
mod shape;

pub use face::{Face, FaceKind};
pub use profile::{Contour, Profile, CIRCLE_SEGMENTS};
pub use shape::{BoundingBox, Shape, ShapeKind};
