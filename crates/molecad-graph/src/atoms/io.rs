//! Inputs, outputs, and constants.

use molecad_geometry::GeometryRequest;
use serde_json::{Map, Value as Json};

use crate::atom::{AtomBehavior, Computation, ComputeCall};
use crate::attachment_point::AttachmentPoint;
use crate::context::Environment;
use crate::registry::AtomType;
use crate::value::{Value, ValueType};

/// Name of the slot on both Input and Output atoms
pub const PASS_THROUGH: &str = "number or geometry";

/// Default a parent input takes for an Input child of `value_type`
pub fn parent_default(value_type: ValueType) -> Value {
    match value_type {
        ValueType::Number => Value::Number(10.0),
        _ => Value::Empty,
    }
}

/// Mirrors the same-named input of the enclosing molecule
#[derive(Debug)]
pub struct InputAtom {
    value_type: ValueType,
    value: Value,
    ready: bool,
}

impl Default for InputAtom {
    fn default() -> Self {
        Self {
            value_type: ValueType::Number,
            value: parent_default(ValueType::Number),
            ready: true,
        }
    }
}

impl AtomBehavior for InputAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Input
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        Vec::new()
    }

    fn output(&self) -> Option<AttachmentPoint> {
        Some(AttachmentPoint::output(PASS_THROUGH, self.value_type))
    }

    fn compute(&mut self, _call: &ComputeCall<'_>) -> Computation {
        if !self.ready {
            return Computation::Wait;
        }
        Computation::Value(self.value.clone())
    }

    fn receive_parent_value(&mut self, value: Option<Value>) {
        match value {
            Some(value) => {
                self.value = value;
                self.ready = true;
            }
            None => self.ready = false,
        }
    }

    fn set_property(&mut self, key: &str, value: &Json) -> Result<(), String> {
        match (key, value.as_str()) {
            ("type", Some(tag)) => {
                self.value_type = ValueType::from_tag(tag);
                self.value = parent_default(self.value_type);
                Ok(())
            }
            _ => Err(format!("Input has no property '{}'", key)),
        }
    }

    fn save(&self, extra: &mut Map<String, Json>) {
        extra.insert("type".into(), Json::from(self.value_type.as_str()));
    }

    fn load(&mut self, extra: &Map<String, Json>) {
        if let Some(tag) = extra.get("type").and_then(Json::as_str) {
            self.value_type = ValueType::from_tag(tag);
            self.value = parent_default(self.value_type);
        }
    }
}

/// Sink that hands its input to the enclosing molecule
#[derive(Debug)]
pub struct OutputAtom;

impl AtomBehavior for OutputAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Output
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![AttachmentPoint::input(PASS_THROUGH, ValueType::Geometry, Value::Empty).primary()]
    }

    fn output(&self) -> Option<AttachmentPoint> {
        None
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        match call.value(PASS_THROUGH) {
            Ok(Value::Geometry(input)) => Computation::Request(GeometryRequest::Copy {
                target: call.id.clone(),
                input: Some(input.clone()),
            }),
            Ok(Value::Empty) | Err(_) => Computation::Request(GeometryRequest::Copy {
                target: call.id.clone(),
                input: None,
            }),
            Ok(other) => Computation::Forward(other.clone()),
        }
    }
}

/// A fixed, editable number
#[derive(Debug)]
pub struct ConstantAtom {
    value: f64,
}

impl Default for ConstantAtom {
    fn default() -> Self {
        Self { value: 10.0 }
    }
}

impl AtomBehavior for ConstantAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Constant
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        Vec::new()
    }

    fn output(&self) -> Option<AttachmentPoint> {
        Some(AttachmentPoint::output("number", ValueType::Number))
    }

    fn compute(&mut self, _call: &ComputeCall<'_>) -> Computation {
        Computation::Value(Value::Number(self.value))
    }

    fn set_property(&mut self, key: &str, value: &Json) -> Result<(), String> {
        match (key, value.as_f64()) {
            ("value", Some(n)) if n.is_finite() => {
                self.value = n;
                Ok(())
            }
            ("value", _) => Err(format!("Constant value must be a number, got {}", value)),
            _ => Err(format!("Constant has no property '{}'", key)),
        }
    }

    fn save(&self, extra: &mut Map<String, Json>) {
        extra.insert("value".into(), Json::from(self.value));
    }

    fn load(&mut self, extra: &Map<String, Json>) {
        if let Some(value) = extra.get("value").and_then(Json::as_f64) {
            self.value = value;
        }
    }
}
