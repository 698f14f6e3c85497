//! Sketch primitives and the operations that shape them.

use molecad_geometry::GeometryRequest;

use super::{geometry_input, number_input, request};
use crate::atom::{AtomBehavior, Computation, ComputeCall};
use crate::attachment_point::AttachmentPoint;
use crate::context::Environment;
use crate::registry::AtomType;

#[derive(Debug)]
pub struct RectangleAtom;

impl AtomBehavior for RectangleAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Rectangle
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![number_input("x", 10.0), number_input("y", 10.0)]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::Rectangle {
                target: call.id.clone(),
                x: call.number("x")?,
                y: call.number("y")?,
            })
        })
    }
}

#[derive(Debug)]
pub struct CircleAtom;

impl AtomBehavior for CircleAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Circle
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![number_input("diameter", 10.0)]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::Circle {
                target: call.id.clone(),
                diameter: call.number("diameter")?,
            })
        })
    }
}

#[derive(Debug)]
pub struct RegularPolygonAtom;

impl AtomBehavior for RegularPolygonAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::RegularPolygon
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![
            number_input("radius", 10.0),
            number_input("number of sides", 6.0),
        ]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::RegularPolygon {
                target: call.id.clone(),
                radius: call.number("radius")?,
                sides: call.number("number of sides")?,
            })
        })
    }
}

#[derive(Debug)]
pub struct ExtrudeAtom;

impl AtomBehavior for ExtrudeAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Extrude
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![geometry_input("geometry"), number_input("height", 10.0)]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::Extrude {
                target: call.id.clone(),
                input: call.geometry("geometry")?,
                height: call.number("height")?,
            })
        })
    }
}

#[derive(Debug)]
pub struct MoveAtom;

impl AtomBehavior for MoveAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Move
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![
            geometry_input("geometry"),
            number_input("xDist", 0.0),
            number_input("yDist", 0.0),
            number_input("zDist", 0.0),
        ]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::Translate {
                target: call.id.clone(),
                input: call.geometry("geometry")?,
                x: call.number("xDist")?,
                y: call.number("yDist")?,
                z: call.number("zDist")?,
            })
        })
    }
}

#[derive(Debug)]
pub struct RotateAtom;

impl AtomBehavior for RotateAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Rotate
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![
            geometry_input("geometry"),
            number_input("x", 0.0),
            number_input("y", 0.0),
            number_input("z", 0.0),
        ]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::Rotate {
                target: call.id.clone(),
                input: call.geometry("geometry")?,
                x: call.number("x")?,
                y: call.number("y")?,
                z: call.number("z")?,
            })
        })
    }
}

#[derive(Debug)]
pub struct DifferenceAtom;

impl AtomBehavior for DifferenceAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Difference
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![geometry_input("geometry1"), geometry_input("geometry2")]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::Difference {
                target: call.id.clone(),
                input: call.geometry("geometry1")?,
                cutter: call.geometry("geometry2")?,
            })
        })
    }
}
