//! The Equation atom.

use serde_json::{Map, Value as Json};
use std::collections::HashMap;

use crate::atom::{AtomBehavior, Computation, ComputeCall, InputChanges};
use crate::attachment_point::AttachmentPoint;
use crate::context::Environment;
use crate::equation::{evaluate, extract_variables};
use crate::registry::AtomType;
use crate::value::{Value, ValueType};

const DEFAULT_EQUATION: &str = "x + y";

/// Evaluates typed arithmetic; every free variable is an input
#[derive(Debug)]
pub struct EquationAtom {
    equation: String,
}

impl Default for EquationAtom {
    fn default() -> Self {
        Self {
            equation: DEFAULT_EQUATION.to_string(),
        }
    }
}

fn variable_input(name: &str) -> AttachmentPoint {
    AttachmentPoint::input(name, ValueType::Number, Value::Number(1.0))
}

impl AtomBehavior for EquationAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Equation
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        extract_variables(&self.equation)
            .iter()
            .map(|name| variable_input(name))
            .collect()
    }

    fn output(&self) -> Option<AttachmentPoint> {
        Some(AttachmentPoint::output("result", ValueType::Number))
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        let mut variables = HashMap::new();
        for name in extract_variables(&self.equation) {
            match call.number(&name) {
                Ok(value) => {
                    variables.insert(name, value);
                }
                Err(reason) => return Computation::Failed(reason),
            }
        }
        match evaluate(&self.equation, &variables) {
            Ok(result) => Computation::Value(Value::Number(result)),
            Err(err) => Computation::Failed(err.to_string()),
        }
    }

    fn sync_inputs(&self, inputs: &[AttachmentPoint]) -> InputChanges {
        let wanted = extract_variables(&self.equation);
        InputChanges {
            remove: inputs
                .iter()
                .filter(|ap| !wanted.contains(&ap.name))
                .map(|ap| ap.name.clone())
                .collect(),
            add: wanted
                .iter()
                .filter(|name| !inputs.iter().any(|ap| &ap.name == *name))
                .map(|name| variable_input(name))
                .collect(),
        }
    }

    fn display_name(&self) -> Option<String> {
        Some(self.equation.clone())
    }

    fn set_property(&mut self, key: &str, value: &Json) -> Result<(), String> {
        match (key, value.as_str()) {
            ("equation", Some(text)) => {
                self.equation = text.trim().to_string();
                Ok(())
            }
            _ => Err(format!("Equation has no property '{}'", key)),
        }
    }

    fn save(&self, extra: &mut Map<String, Json>) {
        extra.insert("currentEquation".into(), Json::from(self.equation.clone()));
    }

    fn load(&mut self, extra: &Map<String, Json>) {
        if let Some(text) = extra.get("currentEquation").and_then(Json::as_str) {
            self.equation = text.trim().to_string();
        }
    }
}
