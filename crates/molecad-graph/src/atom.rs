//! Atoms: the nodes of the graph.
//!
//! An [`Atom`] owns its attachment points and a body. A leaf body is an
//! [`AtomBehavior`] that turns input values into a [`Computation`]; a
//! molecule body is a nested graph whose Input and Output children stand in
//! for the atom's own slots.

use molecad_core::{Units, UniqueId};
use molecad_geometry::{GeometryReply, GeometryRequest, LayoutConfig, Sheets};
use serde_json::{Map, Value as Json};
use std::fmt;

use crate::attachment_point::{AttachmentPoint, ATOM_RADIUS};
use crate::context::Environment;
use crate::molecule::Molecule;
use crate::registry::AtomType;
use crate::value::Value;

/// Where an atom is in its compute cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtomState {
    #[default]
    Idle,
    /// At least one input is locked
    WaitingOnInputs,
    /// A geometry job is in flight
    Processing,
}

/// What an atom asks for after reading its inputs
#[derive(Debug)]
pub enum Computation {
    /// The output is known immediately
    Value(Value),
    /// Ask the geometry service; on success the output is the atom's own library key
    Request(GeometryRequest),
    /// Run the packing search for this atom's input
    Layout { input: UniqueId, config: LayoutConfig },
    /// Hand the value to the enclosing molecule
    Forward(Value),
    /// Not enough information yet
    Wait,
    /// Compute failed; the message is shown on the atom
    Failed(String),
}

/// Inputs to add and remove after a structural change
#[derive(Debug, Default)]
pub struct InputChanges {
    pub remove: Vec<String>,
    pub add: Vec<AttachmentPoint>,
}

impl InputChanges {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// Read access to an atom's inputs while it computes
pub struct ComputeCall<'a> {
    pub id: &'a UniqueId,
    pub inputs: &'a [AttachmentPoint],
    pub env: &'a Environment,
}

impl ComputeCall<'_> {
    pub fn value(&self, name: &str) -> Result<&Value, String> {
        self.inputs
            .iter()
            .find(|ap| ap.name == name)
            .map(|ap| &ap.value)
            .ok_or_else(|| format!("\"{}\" input is missing", name))
    }

    pub fn number(&self, name: &str) -> Result<f64, String> {
        let value = self.value(name)?;
        value
            .as_number()
            .ok_or_else(|| format!("\"{}\" expects a number, found {}", name, value.kind()))
    }

    pub fn text(&self, name: &str) -> Result<String, String> {
        let value = self.value(name)?;
        value
            .as_text()
            .ok_or_else(|| format!("\"{}\" expects text, found {}", name, value.kind()))
    }

    pub fn geometry(&self, name: &str) -> Result<UniqueId, String> {
        self.value(name)?
            .as_geometry()
            .cloned()
            .ok_or_else(|| format!("\"{}\" input is missing", name))
    }

    pub fn units(&self) -> Units {
        self.env.units
    }
}

/// Type-specific behaviour of a leaf atom
pub trait AtomBehavior: Send + fmt::Debug {
    fn atom_type(&self) -> AtomType;

    /// Inputs of a freshly placed atom
    fn inputs(&self, env: &Environment) -> Vec<AttachmentPoint>;

    fn output(&self) -> Option<AttachmentPoint> {
        Some(AttachmentPoint::output("geometry", crate::value::ValueType::Geometry))
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation;

    /// Input changes the atom wants given its current slots
    fn sync_inputs(&self, _inputs: &[AttachmentPoint]) -> InputChanges {
        InputChanges::default()
    }

    /// Recreate an input that a saved connector refers to
    fn restore_input(&self, _name: &str) -> Option<AttachmentPoint> {
        None
    }

    /// A geometry job finished. Returns a warning to show on the atom.
    fn finished(&mut self, _reply: &GeometryReply) -> Option<String> {
        None
    }

    /// Name shown for the atom, when it is derived from its state
    fn display_name(&self) -> Option<String> {
        None
    }

    /// Edit a type-specific property
    fn set_property(&mut self, key: &str, _value: &Json) -> Result<(), String> {
        Err(format!("{} has no property '{}'", self.atom_type().tag(), key))
    }

    /// Value pushed in from the enclosing molecule; `None` while it is locked
    fn receive_parent_value(&mut self, _value: Option<Value>) {}

    /// Start the packing search, for atoms that support one
    fn layout(&mut self, _call: &ComputeCall<'_>) -> Option<Computation> {
        None
    }

    /// A running search found better placements
    fn layout_improved(&mut self, _sheets: &Sheets) {}

    fn save(&self, _extra: &mut Map<String, Json>) {}

    fn load(&mut self, _extra: &Map<String, Json>) {}
}

/// Leaf behaviour or nested graph
#[derive(Debug)]
pub enum AtomBody {
    Leaf(Box<dyn AtomBehavior>),
    Molecule(Box<Molecule>),
}

/// Atom counts used for progress reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Census {
    pub total: usize,
    pub to_process: usize,
}

impl std::ops::Add for Census {
    type Output = Census;

    fn add(self, other: Census) -> Census {
        Census {
            total: self.total + other.total,
            to_process: self.to_process + other.to_process,
        }
    }
}

/// A node of the graph
#[derive(Debug)]
pub struct Atom {
    pub id: UniqueId,
    pub name: String,
    /// Position in normalised canvas space
    pub x: f64,
    pub y: f64,
    pub inputs: Vec<AttachmentPoint>,
    pub output: Option<AttachmentPoint>,
    pub state: AtomState,
    pub alert: Option<String>,
    pub warning: Option<String>,
    pub selected: bool,
    pub(crate) ticket: u64,
    pub body: AtomBody,
}

impl Atom {
    pub fn new(id: UniqueId, atom_type: AtomType, env: &Environment) -> Self {
        let body = atom_type.create(env);
        let (inputs, output) = match &body {
            AtomBody::Leaf(behavior) => (behavior.inputs(env), behavior.output()),
            AtomBody::Molecule(_) => (
                Vec::new(),
                Some(AttachmentPoint::output(
                    "geometry",
                    crate::value::ValueType::Geometry,
                )),
            ),
        };
        Self {
            id,
            name: atom_type.default_name().to_string(),
            x: 0.0,
            y: 0.0,
            inputs,
            output,
            state: AtomState::Idle,
            alert: None,
            warning: None,
            selected: false,
            ticket: 0,
            body,
        }
    }

    pub fn atom_type(&self) -> AtomType {
        match &self.body {
            AtomBody::Leaf(behavior) => behavior.atom_type(),
            AtomBody::Molecule(_) => AtomType::Molecule,
        }
    }

    pub fn is_molecule(&self) -> bool {
        matches!(self.body, AtomBody::Molecule(_))
    }

    pub fn molecule(&self) -> Option<&Molecule> {
        match &self.body {
            AtomBody::Molecule(molecule) => Some(molecule),
            AtomBody::Leaf(_) => None,
        }
    }

    pub fn molecule_mut(&mut self) -> Option<&mut Molecule> {
        match &mut self.body {
            AtomBody::Molecule(molecule) => Some(molecule),
            AtomBody::Leaf(_) => None,
        }
    }

    pub fn behavior_mut(&mut self) -> Option<&mut dyn AtomBehavior> {
        match &mut self.body {
            AtomBody::Leaf(behavior) => Some(behavior.as_mut()),
            AtomBody::Molecule(_) => None,
        }
    }

    pub fn input(&self, name: &str) -> Option<&AttachmentPoint> {
        self.inputs.iter().find(|ap| ap.name == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut AttachmentPoint> {
        self.inputs.iter_mut().find(|ap| ap.name == name)
    }

    pub fn inputs_ready(&self) -> bool {
        self.inputs.iter().all(|ap| ap.ready)
    }

    pub fn output_ready(&self) -> bool {
        self.output.as_ref().is_some_and(|ap| ap.ready)
    }

    /// No input is fed by a connector
    pub fn is_source(&self) -> bool {
        !self.inputs.iter().any(AttachmentPoint::is_connected)
    }

    pub fn census(&self) -> Census {
        match &self.body {
            AtomBody::Molecule(molecule) => molecule.census(),
            AtomBody::Leaf(_) => Census {
                total: 1,
                // waiting on inputs counts too: the atom still has to run
                to_process: usize::from(self.state != AtomState::Idle),
            },
        }
    }

    /// Ids of this atom and everything nested inside it
    pub fn subtree_ids(&self) -> Vec<UniqueId> {
        let mut ids = vec![self.id.clone()];
        if let AtomBody::Molecule(molecule) = &self.body {
            for child in molecule.atoms() {
                ids.extend(child.subtree_ids());
            }
        }
        ids
    }

    /// Canvas position of input `index`; inputs are spread down the left edge
    pub fn input_position(&self, index: usize) -> (f64, f64) {
        let n = self.inputs.len().max(1) as f64;
        let step = 2.0 * ATOM_RADIUS / (n + 1.0);
        (
            self.x - ATOM_RADIUS,
            self.y - ATOM_RADIUS + step * (index as f64 + 1.0),
        )
    }

    pub fn output_position(&self) -> (f64, f64) {
        (self.x + ATOM_RADIUS, self.y)
    }

    pub fn body_contains(&self, pointer: (f64, f64)) -> bool {
        let dx = pointer.0 - self.x;
        let dy = pointer.1 - self.y;
        (dx * dx + dy * dy).sqrt() <= ATOM_RADIUS
    }

    /// Input under the pointer that can still take a connector
    pub fn free_input_at(&self, pointer: (f64, f64)) -> Option<&AttachmentPoint> {
        self.inputs.iter().enumerate().find_map(|(i, ap)| {
            (!ap.is_connected() && ap.was_connection_made(pointer, self.input_position(i)))
                .then_some(ap)
        })
    }

    /// First input without a connector, preferring the primary one
    pub fn first_free_input(&self) -> Option<&AttachmentPoint> {
        self.inputs
            .iter()
            .filter(|ap| !ap.is_connected())
            .min_by_key(|ap| !ap.primary)
    }

    pub(crate) fn refresh_name(&mut self) {
        if let AtomBody::Leaf(behavior) = &self.body {
            if let Some(name) = behavior.display_name() {
                self.name = name;
            }
        }
    }
}
