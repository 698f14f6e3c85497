//! Value propagation through a molecule.
//!
//! Propagation never waits. Locking marks every downstream slot stale;
//! pushing a value sets it and recomputes the sinks. Atoms that need the
//! geometry service leave a [`Job`] in the [`Pass`], tagged with their path
//! and a ticket, and the project feeds the reply back through
//! [`Molecule::complete`]. Anything a molecule needs its parent to do comes
//! back as a list of [`Signal`]s.

use molecad_core::{AlertEvent, GeometryError, GraphError, GraphEvent, RenderEvent, UniqueId};
use molecad_geometry::{GeometryReply, GeometryRequest, LayoutConfig, Sheets};
use tracing::{debug, error, warn};

use crate::atom::{Atom, AtomBody, AtomState, Computation, ComputeCall};
use crate::attachment_point::AttachmentPoint;
use crate::context::Environment;
use crate::molecule::Molecule;
use crate::registry::AtomType;
use crate::value::Value;

/// Work handed to the geometry service
#[derive(Debug)]
pub(crate) enum Work {
    Request(GeometryRequest),
    Layout { input: UniqueId, config: LayoutConfig },
    /// Collect the BOM of the project output
    Bom(UniqueId),
    /// Drop a library entry that no atom owns any more
    Forget(UniqueId),
}

#[derive(Debug)]
pub(crate) struct Job {
    /// Ids from the top-level molecule down to the atom; empty for the project itself
    pub path: Vec<UniqueId>,
    pub ticket: u64,
    pub work: Work,
}

/// Request from a molecule to the atom that wraps it
#[derive(Debug)]
pub(crate) enum Signal {
    /// The Output child went stale
    LockOutput,
    /// The Output child produced a value
    Output(Value),
    AddInput(AttachmentPoint),
    RemoveInput(String),
    RenameInput { from: String, to: String },
}

/// Scratch state of one propagation step
#[derive(Debug)]
pub(crate) struct Pass {
    pub env: Environment,
    /// Path of the molecule currently being worked on
    pub path: Vec<UniqueId>,
    /// Path of the molecule shown to the user
    pub displayed: Vec<UniqueId>,
    pub jobs: Vec<Job>,
    pub events: Vec<GraphEvent>,
    pub next_ticket: u64,
}

impl Pass {
    pub fn new(env: Environment, displayed: Vec<UniqueId>, next_ticket: u64) -> Self {
        Self {
            env,
            path: Vec::new(),
            displayed,
            jobs: Vec::new(),
            events: Vec::new(),
            next_ticket,
        }
    }

    pub fn ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }

    fn job_path(&self, id: &UniqueId) -> Vec<UniqueId> {
        let mut path = self.path.clone();
        path.push(id.clone());
        path
    }

    fn is_displayed(&self) -> bool {
        !self.path.is_empty() && self.path == self.displayed
    }
}

impl Molecule {
    /// Run `f` on the child molecule at `idx` and apply what it signals
    pub(crate) fn with_child(
        &mut self,
        idx: usize,
        pass: &mut Pass,
        f: impl FnOnce(&mut Molecule, &mut Pass) -> Vec<Signal>,
    ) -> Vec<Signal> {
        let id = self.atoms[idx].id.clone();
        let AtomBody::Molecule(child) = &mut self.atoms[idx].body else {
            return Vec::new();
        };
        pass.path.push(id);
        let signals = f(child, pass);
        pass.path.pop();
        self.absorb(idx, signals, pass)
    }

    /// Run `f` on the molecule at relative path `rel`
    pub(crate) fn at_path(
        &mut self,
        rel: &[UniqueId],
        pass: &mut Pass,
        f: &mut dyn FnMut(&mut Molecule, &mut Pass) -> Vec<Signal>,
    ) -> Result<Vec<Signal>, GraphError> {
        let Some((first, rest)) = rel.split_first() else {
            return Ok(f(self, pass));
        };
        let idx = self.index_or_err(first)?;
        if !self.atoms[idx].is_molecule() {
            return Err(GraphError::NotAMolecule {
                id: first.to_string(),
            });
        }
        let mut result = Ok(());
        let signals = self.with_child(idx, pass, |child, pass| {
            child.at_path(rest, pass, f).unwrap_or_else(|err| {
                result = Err(err);
                Vec::new()
            })
        });
        result.map(|()| signals)
    }

    /// Trigger every source atom, or every atom when `force` is set
    pub(crate) fn begin_propagation(&mut self, force: bool, pass: &mut Pass) -> Vec<Signal> {
        let mut up = Vec::new();
        for idx in 0..self.atoms.len() {
            if self.atoms[idx].is_molecule() {
                up.extend(self.with_child(idx, pass, |child, pass| {
                    child.begin_propagation(force, pass)
                }));
            } else if force || self.atoms[idx].is_source() {
                up.extend(self.update_atom(idx, pass));
            }
        }
        up
    }

    /// Recompute a leaf atom from its current inputs
    pub(crate) fn update_atom(&mut self, idx: usize, pass: &mut Pass) -> Vec<Signal> {
        if self.atoms[idx].is_molecule() {
            return Vec::new();
        }
        if !self.atoms[idx].inputs_ready() {
            self.atoms[idx].state = AtomState::WaitingOnInputs;
            return self.lock_output(idx, pass);
        }
        let Atom {
            id, inputs, body, ..
        } = &mut self.atoms[idx];
        let AtomBody::Leaf(behavior) = body else {
            return Vec::new();
        };
        let computation = behavior.compute(&ComputeCall {
            id,
            inputs,
            env: &pass.env,
        });
        self.apply_computation(idx, computation, pass)
    }

    pub(crate) fn apply_computation(
        &mut self,
        idx: usize,
        computation: Computation,
        pass: &mut Pass,
    ) -> Vec<Signal> {
        match computation {
            Computation::Wait => {
                self.atoms[idx].state = AtomState::WaitingOnInputs;
                self.lock_output(idx, pass)
            }
            Computation::Value(value) => {
                self.clear_alert(idx, pass);
                self.push_output(idx, value, pass)
            }
            Computation::Forward(value) => {
                self.clear_alert(idx, pass);
                self.atoms[idx].state = AtomState::Idle;
                self.emit_output(value, pass)
            }
            Computation::Failed(message) => {
                let up = self.lock_output(idx, pass);
                self.atoms[idx].state = AtomState::Idle;
                self.raise_alert(idx, message, pass);
                up
            }
            Computation::Request(request) => self.enqueue(idx, Work::Request(request), pass),
            Computation::Layout { input, config } => {
                self.enqueue(idx, Work::Layout { input, config }, pass)
            }
        }
    }

    fn enqueue(&mut self, idx: usize, work: Work, pass: &mut Pass) -> Vec<Signal> {
        let up = self.lock_output(idx, pass);
        let ticket = pass.ticket();
        let atom = &mut self.atoms[idx];
        atom.state = AtomState::Processing;
        atom.ticket = ticket;
        debug!("Queued {:?} job {} for {}", atom.atom_type(), ticket, atom.id);
        pass.jobs.push(Job {
            path: pass.job_path(&atom.id),
            ticket,
            work,
        });
        up
    }

    /// (sink index, input name) for every connector leaving `id`
    fn sinks_of(&self, id: &UniqueId) -> Vec<(usize, String)> {
        self.connectors
            .iter()
            .filter(|c| &c.source.atom == id)
            .filter_map(|c| Some((self.index_of(&c.sink.atom)?, c.sink.name.clone())))
            .collect()
    }

    /// Mark the output of `idx` stale, and everything downstream of it
    pub(crate) fn lock_output(&mut self, idx: usize, pass: &mut Pass) -> Vec<Signal> {
        if self.atoms[idx].atom_type() == AtomType::Output {
            return vec![Signal::LockOutput];
        }
        let atom = &mut self.atoms[idx];
        let Some(output) = atom.output.as_mut() else {
            return Vec::new();
        };
        if !output.lock() {
            return Vec::new();
        }
        let id = atom.id.clone();
        let mut up = Vec::new();
        for (sink, name) in self.sinks_of(&id) {
            up.extend(self.lock_input(sink, &name, pass));
        }
        up
    }

    pub(crate) fn lock_input(&mut self, idx: usize, name: &str, pass: &mut Pass) -> Vec<Signal> {
        let atom = &mut self.atoms[idx];
        let Some(input) = atom.input_mut(name) else {
            return Vec::new();
        };
        if !input.lock() {
            return Vec::new();
        }
        if !atom.is_molecule() {
            atom.state = AtomState::WaitingOnInputs;
        }
        self.input_changed(idx, name, None, pass)
    }

    pub(crate) fn set_input(
        &mut self,
        idx: usize,
        name: &str,
        value: Value,
        pass: &mut Pass,
    ) -> Vec<Signal> {
        let atom = &mut self.atoms[idx];
        let Some(input) = atom.input_mut(name) else {
            warn!("Atom {} has no input named '{}'", atom.id, name);
            return Vec::new();
        };
        input.set_value(value.clone());
        self.input_changed(idx, name, Some(value), pass)
    }

    /// React to a changed input: molecules hand it to their Input
    /// children, leaves recompute. `None` means the input was locked.
    pub(crate) fn input_changed(
        &mut self,
        idx: usize,
        name: &str,
        value: Option<Value>,
        pass: &mut Pass,
    ) -> Vec<Signal> {
        if self.atoms[idx].is_molecule() {
            return self.with_child(idx, pass, |child, pass| {
                child.update_value_of(name, value, pass)
            });
        }
        match value {
            Some(_) => self.update_atom(idx, pass),
            None => self.lock_output(idx, pass),
        }
    }

    /// Forward a changed molecule input to the Input children of that name
    pub(crate) fn update_value_of(
        &mut self,
        name: &str,
        value: Option<Value>,
        pass: &mut Pass,
    ) -> Vec<Signal> {
        let targets: Vec<usize> = self.input_children(name);
        let mut up = Vec::new();
        for idx in targets {
            if let Some(behavior) = self.atoms[idx].behavior_mut() {
                behavior.receive_parent_value(value.clone());
            }
            up.extend(match value {
                Some(_) => self.update_atom(idx, pass),
                None => self.lock_output(idx, pass),
            });
        }
        up
    }

    /// Set the output of `idx` and push it through every connector
    pub(crate) fn push_output(&mut self, idx: usize, value: Value, pass: &mut Pass) -> Vec<Signal> {
        // lock first so that a sink fed by two paths waits for both
        let mut up = self.lock_output(idx, pass);
        let atom = &mut self.atoms[idx];
        atom.state = AtomState::Idle;
        let Some(output) = atom.output.as_mut() else {
            return up;
        };
        output.set_value(value.clone());
        if atom.selected {
            if let Value::Geometry(id) = &value {
                pass.events.push(GraphEvent::Render(RenderEvent::Requested {
                    id: id.clone(),
                }));
            }
        }
        let id = atom.id.clone();
        for (sink, name) in self.sinks_of(&id) {
            up.extend(self.set_input(sink, &name, value.clone(), pass));
        }
        up
    }

    /// Hand a value to the parent, or hold it while this molecule is displayed
    fn emit_output(&mut self, value: Value, pass: &mut Pass) -> Vec<Signal> {
        if pass.is_displayed() {
            debug!("Holding output of displayed molecule until it is left");
            self.awaiting_propagation = true;
            self.pending_output = Some(value);
            return Vec::new();
        }
        vec![Signal::Output(value)]
    }

    /// Apply the signals raised by the child molecule at `idx`
    pub(crate) fn absorb(&mut self, idx: usize, signals: Vec<Signal>, pass: &mut Pass) -> Vec<Signal> {
        let mut up = Vec::new();
        for signal in signals {
            match signal {
                Signal::LockOutput => up.extend(self.lock_output(idx, pass)),
                Signal::Output(value) => up.extend(self.molecule_output(idx, value, pass)),
                Signal::AddInput(input) => {
                    let atom = &mut self.atoms[idx];
                    if atom.input(&input.name).is_none() {
                        atom.inputs.push(input);
                    }
                }
                Signal::RemoveInput(name) => self.remove_input(idx, &name),
                Signal::RenameInput { from, to } => self.rename_input(idx, &from, &to),
            }
        }
        up
    }

    /// A child molecule's Output produced `value`: copy geometry under the
    /// molecule's own id, pass anything else straight on
    fn molecule_output(&mut self, idx: usize, value: Value, pass: &mut Pass) -> Vec<Signal> {
        match value {
            Value::Geometry(input) => {
                let target = self.atoms[idx].id.clone();
                self.enqueue(
                    idx,
                    Work::Request(GeometryRequest::Copy {
                        target,
                        input: Some(input),
                    }),
                    pass,
                )
            }
            other => self.push_output(idx, other, pass),
        }
    }

    fn remove_input(&mut self, idx: usize, name: &str) {
        let id = self.atoms[idx].id.clone();
        let doomed: Vec<_> = self
            .connectors
            .iter()
            .filter(|c| c.sink.atom == id && c.sink.name == name)
            .map(|c| c.id)
            .collect();
        for connector in doomed {
            self.unlink(connector);
        }
        self.atoms[idx].inputs.retain(|ap| ap.name != name);
    }

    fn rename_input(&mut self, idx: usize, from: &str, to: &str) {
        let id = self.atoms[idx].id.clone();
        if let Some(input) = self.atoms[idx].input_mut(from) {
            input.name = to.to_string();
        }
        for connector in self
            .connectors
            .iter_mut()
            .filter(|c| c.sink.atom == id && c.sink.name == from)
        {
            connector.sink.name = to.to_string();
        }
    }

    /// Feed a service reply back to the atom at relative path `rel`.
    ///
    /// Replies for deleted atoms, superseded tickets, or atoms whose inputs
    /// went stale meanwhile are dropped.
    pub(crate) fn complete(
        &mut self,
        rel: &[UniqueId],
        ticket: u64,
        result: Result<GeometryReply, GeometryError>,
        pass: &mut Pass,
    ) -> Vec<Signal> {
        let Some((first, rest)) = rel.split_first() else {
            return Vec::new();
        };
        let Some(idx) = self.index_of(first) else {
            debug!("Dropping result for removed atom {}", first);
            return Vec::new();
        };
        if !rest.is_empty() {
            return self.with_child(idx, pass, |child, pass| {
                child.complete(rest, ticket, result, pass)
            });
        }

        let atom = &mut self.atoms[idx];
        if atom.ticket != ticket || atom.state != AtomState::Processing {
            debug!("Dropping stale result {} for {}", ticket, atom.id);
            return Vec::new();
        }
        if !atom.is_molecule() && !atom.inputs_ready() {
            debug!("Inputs of {} changed while it computed", atom.id);
            atom.state = AtomState::WaitingOnInputs;
            return Vec::new();
        }

        match result {
            Err(err) => {
                atom.state = AtomState::Idle;
                self.raise_alert(idx, err.to_string(), pass);
                Vec::new()
            }
            Ok(reply) => {
                let warning = atom.behavior_mut().and_then(|b| b.finished(&reply));
                self.set_warning(idx, warning, pass);
                self.clear_alert(idx, pass);
                let value = Value::Geometry(self.atoms[idx].id.clone());
                if self.atoms[idx].atom_type() == AtomType::Output {
                    self.atoms[idx].state = AtomState::Idle;
                    self.emit_output(value, pass)
                } else {
                    self.push_output(idx, value, pass)
                }
            }
        }
    }

    fn raise_alert(&mut self, idx: usize, message: String, pass: &mut Pass) {
        let atom = &mut self.atoms[idx];
        error!("{} {} failed: {}", atom.atom_type(), atom.id, message);
        atom.alert = Some(message.clone());
        pass.events.push(GraphEvent::Alert(AlertEvent::Raised {
            atom: atom.id.clone(),
            message,
        }));
    }

    fn clear_alert(&mut self, idx: usize, pass: &mut Pass) {
        let atom = &mut self.atoms[idx];
        if atom.alert.take().is_some() {
            pass.events.push(GraphEvent::Alert(AlertEvent::Cleared {
                atom: atom.id.clone(),
            }));
        }
    }

    fn set_warning(&mut self, idx: usize, warning: Option<String>, pass: &mut Pass) {
        let atom = &mut self.atoms[idx];
        if let Some(message) = &warning {
            warn!("{} {}: {}", atom.atom_type(), atom.id, message);
            pass.events.push(GraphEvent::Alert(AlertEvent::Warning {
                atom: atom.id.clone(),
                message: message.clone(),
            }));
        }
        atom.warning = warning;
    }

    /// Hand better placements from a running search to the atom at `rel`.
    /// Returns false when the search no longer belongs to the atom.
    pub(crate) fn layout_improved(
        &mut self,
        rel: &[UniqueId],
        ticket: u64,
        sheets: &Sheets,
        pass: &mut Pass,
    ) -> bool {
        let Some((first, rest)) = rel.split_first() else {
            return false;
        };
        let Some(idx) = self.index_of(first) else {
            return false;
        };
        if !rest.is_empty() {
            let mut taken = false;
            self.with_child(idx, pass, |child, pass| {
                taken = child.layout_improved(rest, ticket, sheets, pass);
                Vec::new()
            });
            return taken;
        }

        let atom = &mut self.atoms[idx];
        if atom.ticket != ticket || atom.state != AtomState::Processing {
            return false;
        }
        let Some(behavior) = atom.behavior_mut() else {
            return false;
        };
        behavior.layout_improved(sheets);
        pass.events.push(GraphEvent::Render(RenderEvent::Requested {
            id: atom.id.clone(),
        }));
        true
    }

    /// Start the packing search of the atom `id`
    pub(crate) fn start_layout(
        &mut self,
        id: &UniqueId,
        pass: &mut Pass,
    ) -> Result<Vec<Signal>, GraphError> {
        let idx = self.index_or_err(id)?;
        let Atom {
            id, inputs, body, ..
        } = &mut self.atoms[idx];
        let computation = match body {
            AtomBody::Leaf(behavior) => behavior.layout(&ComputeCall {
                id,
                inputs,
                env: &pass.env,
            }),
            AtomBody::Molecule(_) => None,
        };
        let Some(computation) = computation else {
            return Err(GraphError::Other {
                message: format!("Atom {} does not compute layouts", id),
            });
        };
        Ok(self.apply_computation(idx, computation, pass))
    }

    /// Take the output held while this molecule was displayed
    pub(crate) fn take_pending_output(&mut self) -> Option<Value> {
        if !self.awaiting_propagation {
            return None;
        }
        self.awaiting_propagation = false;
        self.pending_output.take()
    }
}
