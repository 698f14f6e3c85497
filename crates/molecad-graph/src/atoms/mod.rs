//! The atom catalogue.

mod cut_layout;
mod equation;
mod io;
mod shapes;
mod tags;

pub use cut_layout::{CutLayoutAtom, PART_PADDING, SHEET_HEIGHT, SHEET_WIDTH};
pub use equation::EquationAtom;
pub use io::{parent_default, ConstantAtom, InputAtom, OutputAtom, PASS_THROUGH};
pub use shapes::{
    CircleAtom, DifferenceAtom, ExtrudeAtom, MoveAtom, RectangleAtom, RegularPolygonAtom,
    RotateAtom,
};
pub use tags::{AddBomTagAtom, AssemblyAtom, ExtractTagAtom, TagAtom};

use molecad_geometry::GeometryRequest;

use crate::atom::Computation;
use crate::attachment_point::AttachmentPoint;
use crate::value::{Value, ValueType};

fn number_input(name: &str, default: f64) -> AttachmentPoint {
    AttachmentPoint::input(name, ValueType::Number, Value::Number(default))
}

fn text_input(name: &str, default: &str) -> AttachmentPoint {
    AttachmentPoint::input(name, ValueType::String, Value::Text(default.to_string()))
}

fn geometry_input(name: &str) -> AttachmentPoint {
    AttachmentPoint::input(name, ValueType::Geometry, Value::Empty).primary()
}

/// Build a service request, turning a missing or bad input into a failure
fn request(build: impl FnOnce() -> Result<GeometryRequest, String>) -> Computation {
    match build() {
        Ok(request) => Computation::Request(request),
        Err(reason) => Computation::Failed(reason),
    }
}
