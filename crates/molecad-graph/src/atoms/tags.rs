//! Tagging, assemblies, and bill-of-materials entries.

use molecad_geometry::{BomEntry, GeometryRequest};

use super::{geometry_input, number_input, request, text_input};
use crate::atom::{AtomBehavior, Computation, ComputeCall, InputChanges};
use crate::attachment_point::AttachmentPoint;
use crate::context::Environment;
use crate::registry::AtomType;

#[derive(Debug)]
pub struct TagAtom;

impl AtomBehavior for TagAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Tag
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![geometry_input("geometry"), text_input("tag", "cut")]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::Tag {
                target: call.id.clone(),
                input: call.geometry("geometry")?,
                tag: call.text("tag")?,
            })
        })
    }
}

#[derive(Debug)]
pub struct ExtractTagAtom;

impl AtomBehavior for ExtractTagAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::ExtractTag
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![geometry_input("geometry"), text_input("tag", "cut")]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::ExtractTag {
                target: call.id.clone(),
                input: call.geometry("geometry")?,
                tag: call.text("tag")?,
            })
        })
    }
}

#[derive(Debug)]
pub struct AddBomTagAtom;

impl AtomBehavior for AddBomTagAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::AddBomTag
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![
            geometry_input("geometry"),
            text_input("item", "Item"),
            number_input("qty", 1.0),
            number_input("cost", 0.0),
            text_input("link", ""),
        ]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        request(|| {
            Ok(GeometryRequest::AddBom {
                target: call.id.clone(),
                input: call.geometry("geometry")?,
                entry: BomEntry::new(
                    call.text("item")?,
                    call.number("qty")?,
                    call.number("cost")?,
                    call.text("link")?,
                ),
            })
        })
    }
}

const SLOT_PREFIX: &str = "geometry";

fn slot_index(name: &str) -> Option<usize> {
    name.strip_prefix(SLOT_PREFIX)?.parse().ok()
}

/// Groups its inputs; always keeps one empty slot after the connected ones
#[derive(Debug)]
pub struct AssemblyAtom;

impl AtomBehavior for AssemblyAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::Assembly
    }

    fn inputs(&self, _env: &Environment) -> Vec<AttachmentPoint> {
        vec![geometry_input("geometry1"), geometry_input("geometry2")]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        let inputs: Vec<_> = call
            .inputs
            .iter()
            .filter_map(|ap| ap.value.as_geometry().cloned())
            .collect();
        if inputs.is_empty() {
            return Computation::Failed("Nothing to assemble".to_string());
        }
        Computation::Request(GeometryRequest::Assembly {
            target: call.id.clone(),
            inputs,
        })
    }

    fn sync_inputs(&self, inputs: &[AttachmentPoint]) -> InputChanges {
        let mut changes = InputChanges::default();
        let last_connected = inputs.iter().rposition(AttachmentPoint::is_connected);
        let keep_free = last_connected.map_or(0, |i| i + 1);
        for (i, ap) in inputs.iter().enumerate() {
            // unconnected slots before the last connection, and extras after the spare
            let redundant = !ap.is_connected() && i != keep_free;
            if redundant && inputs.len() - changes.remove.len() > 2 {
                changes.remove.push(ap.name.clone());
            }
        }
        if keep_free >= inputs.len() {
            let next = inputs
                .iter()
                .filter_map(|ap| slot_index(&ap.name))
                .max()
                .unwrap_or(0)
                + 1;
            changes.add.push(geometry_input(&format!("{}{}", SLOT_PREFIX, next)));
        }
        changes
    }

    fn restore_input(&self, name: &str) -> Option<AttachmentPoint> {
        slot_index(name).map(|_| geometry_input(name))
    }
}
