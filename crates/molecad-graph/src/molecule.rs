//! Molecules: atoms that contain a graph.
//!
//! A molecule owns its child atoms and the connectors between them. Its
//! Input children mirror the inputs of the atom that wraps it, and its one
//! Output child supplies that atom's output.

use molecad_core::{GraphError, GraphEvent, SelectionEvent, UniqueId, Units};
use molecad_geometry::BomEntry;
use serde_json::{json, Value as Json};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::atom::{Atom, AtomBody, Census};
use crate::attachment_point::AttachmentPoint;
use crate::connector::{Connector, ConnectorId, ConnectorRecord, Endpoint};
use crate::naming::unique_name;
use crate::propagation::{Pass, Signal};
use crate::registry::AtomType;
use crate::serialization::AtomRecord;
use crate::value::{Value, ValueType};

/// Offset applied to pasted atoms so they do not hide the originals
pub const PASTE_OFFSET: f64 = 0.02;

/// Horizontal distance between a wire's source and an Input created for it
const NEW_INPUT_OFFSET: f64 = 0.15;

#[derive(Debug)]
pub struct Molecule {
    pub(crate) atoms: Vec<Atom>,
    pub(crate) connectors: Vec<Connector>,
    next_connector: u64,
    pub top_level: bool,
    pub units: Units,
    /// Bill of materials compiled from the output, top level only
    pub compiled_bom: Vec<BomEntry>,
    /// Where the project is published, kept as written
    pub parent_repo: Option<Json>,
    /// Output produced while displayed, held until the user leaves
    pub(crate) awaiting_propagation: bool,
    pub(crate) pending_output: Option<Value>,
}

impl Molecule {
    pub fn new(units: Units) -> Self {
        Self {
            atoms: Vec::new(),
            connectors: Vec::new(),
            next_connector: 1,
            top_level: false,
            units,
            compiled_bom: Vec::new(),
            parent_repo: None,
            awaiting_propagation: false,
            pending_output: None,
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    pub fn atom(&self, id: &UniqueId) -> Option<&Atom> {
        self.atoms.iter().find(|a| &a.id == id)
    }

    pub fn atom_mut(&mut self, id: &UniqueId) -> Option<&mut Atom> {
        self.atoms.iter_mut().find(|a| &a.id == id)
    }

    /// First child of the given type
    pub fn find(&self, atom_type: AtomType) -> Option<&Atom> {
        self.atoms.iter().find(|a| a.atom_type() == atom_type)
    }

    pub(crate) fn index_of(&self, id: &UniqueId) -> Option<usize> {
        self.atoms.iter().position(|a| &a.id == id)
    }

    pub(crate) fn index_or_err(&self, id: &UniqueId) -> Result<usize, GraphError> {
        self.index_of(id).ok_or_else(|| GraphError::AtomNotFound { id: id.to_string() })
    }

    pub fn census(&self) -> Census {
        self.atoms
            .iter()
            .map(Atom::census)
            .fold(Census::default(), |acc, c| acc + c)
    }

    pub fn is_awaiting_propagation(&self) -> bool {
        self.awaiting_propagation
    }

    pub fn selected_ids(&self) -> Vec<UniqueId> {
        self.atoms
            .iter()
            .filter(|a| a.selected)
            .map(|a| a.id.clone())
            .collect()
    }

    pub(crate) fn input_names(&self) -> Vec<String> {
        self.atoms
            .iter()
            .filter(|a| a.atom_type() == AtomType::Input)
            .map(|a| a.name.clone())
            .collect()
    }

    pub(crate) fn input_children(&self, name: &str) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.atom_type() == AtomType::Input && a.name == name)
            .map(|(i, _)| i)
            .collect()
    }

    /// Hand a restored wrapper input to the Input children without propagating
    pub(crate) fn seed_input(&mut self, name: &str, value: Value) {
        for idx in self.input_children(name) {
            if let Some(behavior) = self.atoms[idx].behavior_mut() {
                behavior.receive_parent_value(Some(value.clone()));
            }
        }
    }

    /// Select exactly `ids`
    pub(crate) fn select(&mut self, ids: &[UniqueId], pass: &mut Pass) {
        for atom in &mut self.atoms {
            atom.selected = ids.contains(&atom.id);
        }
        pass.events
            .push(GraphEvent::Selection(SelectionEvent::Changed {
                selected: self.selected_ids(),
            }));
    }

    /// Add an atom described by `record`.
    ///
    /// `unlock` marks a user placement: the atom computes right away and an
    /// Input gets a name no other Input uses. Loading passes false and lets
    /// the first propagation run everything.
    pub(crate) fn place_atom(
        &mut self,
        mut record: AtomRecord,
        unlock: bool,
        pass: &mut Pass,
    ) -> Result<(UniqueId, Vec<Signal>), GraphError> {
        let atom_type =
            AtomType::from_tag(&record.atom_type).ok_or_else(|| GraphError::UnknownAtomType {
                atom_type: record.atom_type.clone(),
            })?;
        if self.index_of(&record.unique_id).is_some() {
            return Err(GraphError::Other {
                message: format!("An atom with id {} already exists", record.unique_id),
            });
        }

        let mut up = Vec::new();
        if atom_type == AtomType::Output {
            let existing: Vec<UniqueId> = self
                .atoms
                .iter()
                .filter(|a| a.atom_type() == AtomType::Output)
                .map(|a| a.id.clone())
                .collect();
            for id in existing {
                debug!("Replacing Output {}", id);
                up.extend(self.delete_atom(&id, pass)?);
            }
        }
        if atom_type == AtomType::Input && unlock {
            let name = record
                .name
                .clone()
                .unwrap_or_else(|| atom_type.default_name().to_string());
            record.name = Some(unique_name(&name, &self.input_names()));
        }

        let (atom, signals) = Atom::from_record(&record, atom_type, pass)?;
        up.extend(signals);
        if atom_type == AtomType::Input {
            let value_type = atom
                .output
                .as_ref()
                .map_or(ValueType::Number, |ap| ap.value_type);
            up.push(Signal::AddInput(AttachmentPoint::input(
                atom.name.clone(),
                value_type,
                crate::atoms::parent_default(value_type),
            )));
        }
        let id = atom.id.clone();
        debug!("Placed {} {}", atom_type, id);
        self.atoms.push(atom);

        if unlock {
            let idx = self.atoms.len() - 1;
            if self.atoms[idx].is_molecule() {
                up.extend(self.with_child(idx, pass, |child, pass| {
                    child.begin_propagation(true, pass)
                }));
            } else {
                up.extend(self.update_atom(idx, pass));
            }
        }
        Ok((id, up))
    }

    /// Remove an atom and every connector that touches it
    pub(crate) fn delete_atom(
        &mut self,
        id: &UniqueId,
        pass: &mut Pass,
    ) -> Result<Vec<Signal>, GraphError> {
        self.index_or_err(id)?;
        let mut up = Vec::new();
        let touching: Vec<(ConnectorId, bool)> = self
            .connectors
            .iter()
            .filter(|c| c.touches(id))
            .map(|c| (c.id, &c.sink.atom == id))
            .collect();
        for (connector, incoming) in touching {
            // downstream sinks fall back to their defaults and recompute
            up.extend(self.delete_connector(connector, incoming, pass)?);
        }

        let idx = self.index_or_err(id)?;
        let atom = self.atoms.remove(idx);
        if atom.atom_type() == AtomType::Input {
            up.push(Signal::RemoveInput(atom.name.clone()));
        }
        if atom.selected {
            pass.events
                .push(GraphEvent::Selection(SelectionEvent::Changed {
                    selected: self.selected_ids(),
                }));
        }
        info!("Deleted {} {}", atom.atom_type(), atom.id);
        Ok(up)
    }

    /// Detach a connector from the atoms it joins, leaving the sink's value alone
    pub(crate) fn unlink(&mut self, id: ConnectorId) -> Option<Connector> {
        let pos = self.connectors.iter().position(|c| c.id == id)?;
        let connector = self.connectors.remove(pos);
        if let Some(source) = self
            .atom_mut(&connector.source.atom)
            .and_then(|a| a.output.as_mut())
        {
            source.delete_connector(id, true);
        }
        Some(connector)
    }

    /// Join an output to an input
    pub(crate) fn place_connector(
        &mut self,
        record: &ConnectorRecord,
        pass: &mut Pass,
    ) -> Result<(ConnectorId, Vec<Signal>), GraphError> {
        let src = self.index_or_err(&record.ap1_id)?;
        let dst = self.index_or_err(&record.ap2_id)?;
        if src == dst {
            return Err(GraphError::SelfConnection {
                atom: record.ap1_id.to_string(),
            });
        }
        let Some(output) = &self.atoms[src].output else {
            return Err(GraphError::AttachmentPointNotFound {
                atom: record.ap1_id.to_string(),
                name: record.ap1_name.clone(),
            });
        };
        let source_name = output.name.clone();

        if self.atoms[dst].input(&record.ap2_name).is_none() {
            let restored = match &self.atoms[dst].body {
                AtomBody::Leaf(behavior) => behavior.restore_input(&record.ap2_name),
                AtomBody::Molecule(_) => None,
            };
            let Some(input) = restored else {
                return Err(GraphError::AttachmentPointNotFound {
                    atom: record.ap2_id.to_string(),
                    name: record.ap2_name.clone(),
                });
            };
            self.atoms[dst].inputs.push(input);
        }
        if self.atoms[dst]
            .input(&record.ap2_name)
            .is_some_and(AttachmentPoint::is_connected)
        {
            return Err(GraphError::InputAlreadyConnected {
                atom: record.ap2_id.to_string(),
                name: record.ap2_name.clone(),
            });
        }
        if self.reaches(&record.ap2_id, &record.ap1_id) {
            return Err(GraphError::Other {
                message: "Connector would create a cycle".to_string(),
            });
        }

        let id = ConnectorId(self.next_connector);
        self.next_connector += 1;
        if let Some(output) = self.atoms[src].output.as_mut() {
            output.attach(id);
        }
        if let Some(input) = self.atoms[dst].input_mut(&record.ap2_name) {
            input.attach(id);
        }
        self.connectors.push(Connector {
            id,
            source: Endpoint::new(record.ap1_id.clone(), source_name),
            sink: Endpoint::new(record.ap2_id.clone(), record.ap2_name.clone()),
            sink_primary: record.ap2_primary,
            selected: false,
        });
        self.sync_inputs(dst);

        let up = if self.atoms[src].output_ready() {
            let value = self.atoms[src]
                .output
                .as_ref()
                .map_or(Value::Empty, |ap| ap.value.clone());
            self.set_input(dst, &record.ap2_name, value, pass)
        } else {
            self.lock_input(dst, &record.ap2_name, pass)
        };
        debug!("Connected {} to {}.{}", record.ap1_id, record.ap2_id, record.ap2_name);
        Ok((id, up))
    }

    /// Remove a connector. Unless `silent`, the sink input falls back to its
    /// default and the sink recomputes.
    pub(crate) fn delete_connector(
        &mut self,
        id: ConnectorId,
        silent: bool,
        pass: &mut Pass,
    ) -> Result<Vec<Signal>, GraphError> {
        let connector = self.unlink(id).ok_or_else(|| GraphError::Other {
            message: format!("Connector {} not found", id),
        })?;
        let Some(dst) = self.index_of(&connector.sink.atom) else {
            return Ok(Vec::new());
        };
        let name = connector.sink.name;
        let reset = self.atoms[dst]
            .input_mut(&name)
            .is_some_and(|ap| ap.delete_connector(id, silent));
        let resized = self.sync_inputs(dst);
        if silent || !(reset || resized) {
            return Ok(Vec::new());
        }
        let value = self.atoms[dst].input(&name).map(|ap| ap.value.clone());
        Ok(match value {
            Some(value) if self.atoms[dst].is_molecule() => {
                self.input_changed(dst, &name, Some(value), pass)
            }
            _ => self.update_atom(dst, pass),
        })
    }

    /// Let the atom at `idx` add or drop inputs. Returns whether anything changed.
    pub(crate) fn sync_inputs(&mut self, idx: usize) -> bool {
        let changes = match &self.atoms[idx].body {
            AtomBody::Leaf(behavior) => behavior.sync_inputs(&self.atoms[idx].inputs),
            AtomBody::Molecule(_) => return false,
        };
        if changes.is_empty() {
            return false;
        }
        let id = self.atoms[idx].id.clone();
        for name in &changes.remove {
            let doomed: Vec<ConnectorId> = self
                .connectors
                .iter()
                .filter(|c| c.sink.atom == id && &c.sink.name == name)
                .map(|c| c.id)
                .collect();
            for connector in doomed {
                self.unlink(connector);
            }
            self.atoms[idx].inputs.retain(|ap| &ap.name != name);
        }
        self.atoms[idx].inputs.extend(changes.add);
        true
    }

    /// Whether `to` is downstream of `from`
    fn reaches(&self, from: &UniqueId, to: &UniqueId) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            queue.extend(
                self.connectors
                    .iter()
                    .filter(|c| &c.source.atom == current)
                    .map(|c| &c.sink.atom),
            );
        }
        false
    }

    /// Finish a wire dragged from `source` and released at `pointer`.
    ///
    /// A free input under the pointer wins. Failing that, a wire released on
    /// an atom body goes to its first free input; a molecule without one
    /// grows a new Input. Anywhere else the wire is discarded.
    pub(crate) fn drop_wire(
        &mut self,
        source: &UniqueId,
        pointer: (f64, f64),
        pass: &mut Pass,
    ) -> Result<(Option<ConnectorId>, Vec<Signal>), GraphError> {
        let src = self.index_or_err(source)?;
        let Some(output) = &self.atoms[src].output else {
            return Err(GraphError::AttachmentPointNotFound {
                atom: source.to_string(),
                name: "output".to_string(),
            });
        };
        let (output_name, output_type) = (output.name.clone(), output.value_type);

        let mut up = Vec::new();
        let mut target = self
            .atoms
            .iter()
            .filter(|a| &a.id != source)
            .find_map(|a| {
                a.free_input_at(pointer)
                    .map(|ap| (a.id.clone(), ap.name.clone(), ap.primary))
            });

        if target.is_none() {
            if let Some(idx) = self
                .atoms
                .iter()
                .position(|a| &a.id != source && a.body_contains(pointer))
            {
                let atom = &self.atoms[idx];
                if let Some(ap) = atom.first_free_input() {
                    target = Some((atom.id.clone(), ap.name.clone(), ap.primary));
                } else if let Some(child) = atom.molecule() {
                    let source_atom = &self.atoms[src];
                    let base = if source_atom.atom_type() == AtomType::Input {
                        source_atom.name.as_str()
                    } else {
                        "input"
                    };
                    let name = unique_name(base, &child.input_names());
                    let mut record = AtomRecord::new(
                        AtomType::Input,
                        UniqueId::generate(),
                        &name,
                        (source_atom.x - NEW_INPUT_OFFSET).max(0.0),
                        source_atom.y,
                    );
                    record
                        .extra
                        .insert("type".into(), Json::String(output_type.as_str().into()));
                    target = Some((atom.id.clone(), name, false));
                    up.extend(self.with_child(idx, pass, |child, pass| {
                        match child.place_atom(record, true, pass) {
                            Ok((_, signals)) => signals,
                            Err(err) => {
                                warn!("Could not add an input to the molecule: {}", err);
                                Vec::new()
                            }
                        }
                    }));
                }
            }
        }

        let Some((sink, name, primary)) = target else {
            debug!("Wire from {} dropped on empty canvas", source);
            return Ok((None, up));
        };
        let record = ConnectorRecord {
            ap1_name: output_name,
            ap2_name: name,
            ap2_primary: primary,
            ap1_id: source.clone(),
            ap2_id: sink,
        };
        let (id, signals) = self.place_connector(&record, pass)?;
        up.extend(signals);
        Ok((Some(id), up))
    }

    /// Rename an atom; Input children carry the new name to the wrapper's slot
    pub(crate) fn rename_atom(
        &mut self,
        id: &UniqueId,
        name: &str,
    ) -> Result<Vec<Signal>, GraphError> {
        let taken = self.input_names();
        let idx = self.index_or_err(id)?;
        let atom = &mut self.atoms[idx];
        if atom.atom_type() != AtomType::Input {
            atom.name = name.to_string();
            return Ok(Vec::new());
        }
        if atom.name == name {
            return Ok(Vec::new());
        }
        let from = std::mem::replace(&mut atom.name, unique_name(name, &taken));
        Ok(vec![Signal::RenameInput {
            from,
            to: atom.name.clone(),
        }])
    }

    /// Selected atoms and the connectors between them, as clipboard JSON
    pub(crate) fn copy_selection(&self) -> Json {
        let selected: HashSet<&UniqueId> = self
            .atoms
            .iter()
            .filter(|a| a.selected)
            .map(|a| &a.id)
            .collect();
        let atoms: Vec<Json> = self
            .atoms
            .iter()
            .filter(|a| a.selected)
            .filter_map(|a| serde_json::to_value(a.to_record()).ok())
            .collect();
        let connectors: Vec<Json> = self
            .connectors
            .iter()
            .filter(|c| selected.contains(&c.source.atom) && selected.contains(&c.sink.atom))
            .filter_map(|c| serde_json::to_value(c.record()).ok())
            .collect();
        json!({ "allAtoms": atoms, "allConnectors": connectors })
    }

    /// Place clipboard contents under fresh ids, shifted by `offset`
    pub(crate) fn paste(
        &mut self,
        clipboard: &Json,
        offset: f64,
        pass: &mut Pass,
    ) -> Result<(Vec<UniqueId>, Vec<Signal>), GraphError> {
        let (mut atoms, mut connectors) = read_clipboard(clipboard)?;
        remap_ids(&mut atoms, &mut connectors);

        let mut up = Vec::new();
        let mut placed = Vec::new();
        for mut record in atoms {
            record.x += offset;
            record.y += offset;
            match self.place_atom(record, true, pass) {
                Ok((id, signals)) => {
                    placed.push(id);
                    up.extend(signals);
                }
                Err(err) => warn!("Skipping pasted atom: {}", err),
            }
        }
        for record in &connectors {
            match self.place_connector(record, pass) {
                Ok((_, signals)) => up.extend(signals),
                Err(err) => warn!("Unable to place connector: {}", err),
            }
        }
        Ok((placed, up))
    }

    /// Replace the selection with a new molecule that contains it
    pub(crate) fn move_selected_to_new_molecule(
        &mut self,
        pass: &mut Pass,
    ) -> Result<Option<(UniqueId, Vec<Signal>)>, GraphError> {
        let selected = self.selected_ids();
        if selected.is_empty() {
            return Ok(None);
        }
        let clipboard = self.copy_selection();
        let count = selected.len() as f64;
        let (x, y) = self
            .atoms
            .iter()
            .filter(|a| a.selected)
            .fold((0.0, 0.0), |(x, y), a| (x + a.x, y + a.y));

        let mut up = Vec::new();
        for id in &selected {
            up.extend(self.delete_atom(id, pass)?);
        }
        let record = AtomRecord::new(
            AtomType::Molecule,
            UniqueId::generate(),
            "New Molecule",
            x / count,
            y / count,
        );
        let (id, signals) = self.place_atom(record, false, pass)?;
        up.extend(signals);
        let idx = self.index_or_err(&id)?;
        up.extend(self.with_child(idx, pass, |child, pass| {
            match child.paste(&clipboard, 0.0, pass) {
                Ok((_, mut signals)) => {
                    for atom in &mut child.atoms {
                        atom.selected = false;
                    }
                    signals.extend(child.begin_propagation(true, pass));
                    signals
                }
                Err(err) => {
                    warn!("Could not fill the new molecule: {}", err);
                    Vec::new()
                }
            }
        }));
        info!("Moved {} atoms into molecule {}", selected.len(), id);
        Ok(Some((id, up)))
    }
}

fn read_clipboard(clipboard: &Json) -> Result<(Vec<AtomRecord>, Vec<ConnectorRecord>), GraphError> {
    let malformed = || GraphError::Other {
        message: "Clipboard does not hold atoms".to_string(),
    };
    let atoms = clipboard
        .get("allAtoms")
        .and_then(Json::as_array)
        .ok_or_else(malformed)?
        .iter()
        .filter_map(|json| serde_json::from_value(json.clone()).ok())
        .collect();
    let connectors = clipboard
        .get("allConnectors")
        .and_then(Json::as_array)
        .map(|all| {
            all.iter()
                .filter_map(|json| serde_json::from_value(json.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    Ok((atoms, connectors))
}

/// Give every atom a fresh id, nested molecules included, and rewire the
/// connectors to match
pub(crate) fn remap_ids(atoms: &mut [AtomRecord], connectors: &mut [ConnectorRecord]) {
    let mut fresh: HashMap<UniqueId, UniqueId> = HashMap::new();
    for record in atoms.iter_mut() {
        let id = UniqueId::generate();
        fresh.insert(record.unique_id.clone(), id.clone());
        record.unique_id = id;
        if AtomType::from_tag(&record.atom_type) == Some(AtomType::Molecule) {
            remap_nested(record);
        }
    }
    for connector in connectors.iter_mut() {
        if let Some(id) = fresh.get(&connector.ap1_id) {
            connector.ap1_id = id.clone();
        }
        if let Some(id) = fresh.get(&connector.ap2_id) {
            connector.ap2_id = id.clone();
        }
    }
}

fn remap_nested(record: &mut AtomRecord) {
    let (Some(Json::Array(atoms)), connectors) = (
        record.extra.get("allAtoms").cloned(),
        record.extra.get("allConnectors").cloned(),
    ) else {
        return;
    };
    let mut atoms: Vec<AtomRecord> = atoms
        .into_iter()
        .filter_map(|json| serde_json::from_value(json).ok())
        .collect();
    let mut connectors: Vec<ConnectorRecord> = connectors
        .and_then(|json| serde_json::from_value(json).ok())
        .unwrap_or_default();
    remap_ids(&mut atoms, &mut connectors);
    if let (Ok(atoms), Ok(connectors)) = (
        serde_json::to_value(&atoms),
        serde_json::to_value(&connectors),
    ) {
        record.extra.insert("allAtoms".into(), atoms);
        record.extra.insert("allConnectors".into(), connectors);
    }
}
