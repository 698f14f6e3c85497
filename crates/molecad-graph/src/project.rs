//! A project session: the top-level molecule, navigation, undo, and the
//! loop that runs geometry jobs.
//!
//! Edits are synchronous: they update the graph and queue the geometry jobs
//! it needs. [`Project::run_until_idle`] sends those jobs to the geometry
//! service and feeds the replies back until nothing is left in flight.
//! Layout searches also report better placements while they run; those
//! reach the searching atom through the same loop.

use anyhow::{Context, Result as AnyResult};
use molecad_core::{
    AlertEvent, Error, EventBus, GeometryError, GraphError, GraphEvent, ProgressEvent,
    ProjectEvent, RenderEvent, UniqueId, Units,
};
use molecad_geometry::{
    BomEntry, CancelHandle, GeometryReply, GeometryRequest, LayoutEvent, Sheets,
};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::atom::{Atom, AtomState, Census};
use crate::bom::{compile_bom, format_bom};
use crate::connector::{ConnectorId, ConnectorRecord};
use crate::context::{Environment, GraphContext};
use crate::history::UndoStack;
use crate::molecule::{Molecule, PASTE_OFFSET};
use crate::propagation::{Job, Pass, Signal, Work};
use crate::registry::AtomType;
use crate::serialization::{parse_project, AtomRecord};
use crate::value::{Value, ValueType};

/// Name given to the top-level molecule
const PROJECT_NAME: &str = "Project";

struct Completion {
    path: Vec<UniqueId>,
    ticket: u64,
    outcome: Outcome,
}

/// Better placements from a search that is still running
struct Improvement {
    path: Vec<UniqueId>,
    ticket: u64,
    sheets: Sheets,
}

enum Outcome {
    Atom(Result<GeometryReply, GeometryError>),
    Bom(Result<Vec<BomEntry>, GeometryError>),
    Forgotten,
}

pub struct Project {
    context: GraphContext,
    env: Environment,
    root: Atom,
    /// Molecule the user is looking at, as ids below the top level
    path: Vec<UniqueId>,
    history: UndoStack,
    next_ticket: u64,
    queue: Vec<Job>,
    /// Running layout searches by atom path, with the ticket that started them
    layouts: HashMap<Vec<UniqueId>, (u64, CancelHandle)>,
    in_flight: JoinSet<Completion>,
    improvements_tx: mpsc::UnboundedSender<Improvement>,
    improvements_rx: mpsc::UnboundedReceiver<Improvement>,
}

fn build_root(record: &AtomRecord, env: &Environment) -> Result<Atom, GraphError> {
    let mut pass = Pass::new(env.clone(), Vec::new(), 0);
    let (mut root, _) = Atom::from_record(record, AtomType::Molecule, &mut pass)?;
    if let Some(molecule) = root.molecule_mut() {
        molecule.top_level = true;
    }
    Ok(root)
}

impl Project {
    /// Empty project holding only an Output
    pub fn new(context: GraphContext, units: Units) -> Self {
        let env = context.settings.environment(units);
        let mut root = Atom::new(UniqueId::generate(), AtomType::Molecule, &env);
        root.name = PROJECT_NAME.to_string();
        let mut pass = Pass::new(env.clone(), Vec::new(), 0);
        if let Some(molecule) = root.molecule_mut() {
            molecule.top_level = true;
            let output =
                AtomRecord::new(AtomType::Output, UniqueId::generate(), "Output", 0.9, 0.5);
            if let Err(err) = molecule.place_atom(output, false, &mut pass) {
                warn!("Could not place the project output: {}", err);
            }
        }
        Self::assemble(context, env, root)
    }

    /// Load a project from its JSON document
    pub fn from_json(context: GraphContext, text: &str) -> Result<Self, Error> {
        let record = parse_project(text)?;
        let units = record
            .extra
            .get("unitsKey")
            .and_then(Json::as_str)
            .and_then(|key| key.parse::<Units>().ok())
            .unwrap_or_default();
        let env = context.settings.environment(units);
        let root = build_root(&record, &env)?;
        let project = Self::assemble(context, env, root);
        let atoms = project.root.molecule().map_or(0, |m| m.atoms().len());
        info!("Loaded project {} with {} top-level atoms", project.root.id, atoms);
        project
            .context
            .bus
            .publish(GraphEvent::Project(ProjectEvent::Loaded { atoms }));
        Ok(project)
    }

    pub fn load(context: GraphContext, path: impl AsRef<Path>) -> AnyResult<Self> {
        let text =
            std::fs::read_to_string(path.as_ref()).context("Failed to read project file")?;
        Self::from_json(context, &text).context("Failed to load project")
    }

    fn assemble(context: GraphContext, env: Environment, root: Atom) -> Self {
        let history = UndoStack::new(context.settings.undo_depth);
        let (improvements_tx, improvements_rx) = mpsc::unbounded_channel();
        let mut project = Self {
            context,
            env,
            root,
            path: Vec::new(),
            history,
            next_ticket: 0,
            queue: Vec::new(),
            layouts: HashMap::new(),
            in_flight: JoinSet::new(),
            improvements_tx,
            improvements_rx,
        };
        project.propagate(false);
        project
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(&self.root.to_record())?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> AnyResult<()> {
        let json = self.to_json().context("Failed to serialize project")?;
        std::fs::write(path.as_ref(), json).context("Failed to write project file")?;
        self.context
            .bus
            .publish(GraphEvent::Project(ProjectEvent::Saved));
        Ok(())
    }

    pub fn root(&self) -> &Atom {
        &self.root
    }

    pub fn units(&self) -> Units {
        self.env.units
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.context.bus
    }

    /// Path of the displayed molecule; empty at the top level
    pub fn current_path(&self) -> &[UniqueId] {
        &self.path
    }

    /// The displayed molecule
    pub fn current(&self) -> Option<&Molecule> {
        let mut molecule = self.root.molecule()?;
        for id in &self.path {
            molecule = molecule.atom(id)?.molecule()?;
        }
        Some(molecule)
    }

    /// Output of the project once everything upstream has settled
    pub fn output(&self) -> Option<&Value> {
        self.root
            .output
            .as_ref()
            .filter(|ap| ap.ready)
            .map(|ap| &ap.value)
    }

    pub fn census(&self) -> Census {
        self.root.census()
    }

    pub fn bom(&self) -> &[BomEntry] {
        self.root
            .molecule()
            .map(|m| m.compiled_bom.as_slice())
            .unwrap_or_default()
    }

    pub fn bom_markdown(&self) -> String {
        format_bom(self.bom())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    fn pass(&self) -> Pass {
        Pass::new(self.env.clone(), self.path.clone(), self.next_ticket)
    }

    /// Run `op` on the molecule at `path` and settle whatever it signals
    fn at_path<T>(
        &mut self,
        path: Vec<UniqueId>,
        op: impl FnOnce(&mut Molecule, &mut Pass) -> Result<(T, Vec<Signal>), GraphError>,
    ) -> Result<T, GraphError> {
        let mut pass = self.pass();
        let root = self.root.molecule_mut().ok_or_else(|| GraphError::NotAMolecule {
            id: PROJECT_NAME.to_string(),
        })?;
        let mut op = Some(op);
        let mut result = None;
        let signals = root.at_path(&path, &mut pass, &mut |molecule, pass| {
            let Some(op) = op.take() else {
                return Vec::new();
            };
            match op(molecule, pass) {
                Ok((value, signals)) => {
                    result = Some(Ok(value));
                    signals
                }
                Err(err) => {
                    result = Some(Err(err));
                    Vec::new()
                }
            }
        })?;
        self.finish(pass, signals);
        result.unwrap_or_else(|| {
            Err(GraphError::Other {
                message: "Molecule not reached".to_string(),
            })
        })
    }

    fn in_current<T>(
        &mut self,
        op: impl FnOnce(&mut Molecule, &mut Pass) -> Result<(T, Vec<Signal>), GraphError>,
    ) -> Result<T, GraphError> {
        self.at_path(self.path.clone(), op)
    }

    /// A user edit: snapshot for undo, then run it in the displayed molecule
    fn edit<T>(
        &mut self,
        operation: &str,
        context: String,
        op: impl FnOnce(&mut Molecule, &mut Pass) -> Result<(T, Vec<Signal>), GraphError>,
    ) -> Result<T, GraphError> {
        let snapshot = match serde_json::to_string(&self.root.to_record()) {
            Ok(json) => Some(json),
            Err(err) => {
                warn!("Could not snapshot the project for undo: {}", err);
                None
            }
        };
        let result = self.in_current(op);
        match (&result, snapshot) {
            (Ok(_), Some(snapshot)) => self.history.push(snapshot, operation, context),
            (Err(err), _) => warn!("{} failed: {}", operation, err),
            _ => {}
        }
        result
    }

    fn finish(&mut self, mut pass: Pass, signals: Vec<Signal>) {
        self.absorb_root(signals, &mut pass);
        self.next_ticket = pass.next_ticket;
        self.queue.append(&mut pass.jobs);
        let bus = &self.context.bus;
        for event in pass.events {
            bus.publish(event);
        }
        let Census { total, to_process } = self.root.census();
        bus.publish(GraphEvent::Progress(ProgressEvent::Census {
            total,
            to_process,
        }));
    }

    /// The top-level molecule has no parent; its signals land here
    fn absorb_root(&mut self, signals: Vec<Signal>, pass: &mut Pass) {
        for signal in signals {
            match signal {
                Signal::LockOutput => {
                    if let Some(output) = self.root.output.as_mut() {
                        output.lock();
                    }
                }
                Signal::Output(Value::Geometry(input)) => {
                    let ticket = pass.ticket();
                    self.root.ticket = ticket;
                    self.root.state = AtomState::Processing;
                    if let Some(output) = self.root.output.as_mut() {
                        output.lock();
                    }
                    pass.jobs.push(Job {
                        path: Vec::new(),
                        ticket,
                        work: Work::Request(GeometryRequest::Copy {
                            target: self.root.id.clone(),
                            input: Some(input),
                        }),
                    });
                }
                Signal::Output(value) => {
                    self.root.state = AtomState::Idle;
                    if let Some(output) = self.root.output.as_mut() {
                        output.set_value(value);
                    }
                }
                Signal::AddInput(input) => {
                    if self.root.input(&input.name).is_none() {
                        self.root.inputs.push(input);
                    }
                }
                Signal::RemoveInput(name) => self.root.inputs.retain(|ap| ap.name != name),
                Signal::RenameInput { from, to } => {
                    if let Some(input) = self.root.input_mut(&from) {
                        input.name = to;
                    }
                }
            }
        }
    }

    /// Trigger the sources of every molecule, or every atom when `force` is set
    pub fn propagate(&mut self, force: bool) {
        if let Err(err) = self.at_path(Vec::new(), |molecule, pass| {
            Ok(((), molecule.begin_propagation(force, pass)))
        }) {
            warn!("Propagation failed: {}", err);
        }
    }

    pub fn place_atom(&mut self, atom_type: AtomType, x: f64, y: f64) -> Result<UniqueId, GraphError> {
        let record = AtomRecord::new(
            atom_type,
            UniqueId::generate(),
            atom_type.default_name(),
            x,
            y,
        );
        self.edit("placeAtom", atom_type.tag().to_string(), |molecule, pass| {
            molecule.place_atom(record, true, pass)
        })
    }

    pub fn place_connector(&mut self, record: ConnectorRecord) -> Result<ConnectorId, GraphError> {
        let context = format!("{} -> {}.{}", record.ap1_id, record.ap2_id, record.ap2_name);
        self.edit("placeConnector", context, |molecule, pass| {
            molecule.place_connector(&record, pass)
        })
    }

    /// Wire the output of `from` into `input` of `to`
    pub fn connect(
        &mut self,
        from: &UniqueId,
        to: &UniqueId,
        input: &str,
    ) -> Result<ConnectorId, GraphError> {
        let ap1_name = self
            .current()
            .and_then(|m| m.atom(from))
            .and_then(|a| a.output.as_ref())
            .map(|ap| ap.name.clone())
            .unwrap_or_default();
        let ap2_primary = self
            .current()
            .and_then(|m| m.atom(to))
            .and_then(|a| a.input(input))
            .is_some_and(|ap| ap.primary);
        self.place_connector(ConnectorRecord {
            ap1_name,
            ap2_name: input.to_string(),
            ap2_primary,
            ap1_id: from.clone(),
            ap2_id: to.clone(),
        })
    }

    /// Release a wire dragged from `source` at canvas position (x, y)
    pub fn drop_wire(
        &mut self,
        source: &UniqueId,
        x: f64,
        y: f64,
    ) -> Result<Option<ConnectorId>, GraphError> {
        self.edit("dropWire", source.to_string(), |molecule, pass| {
            molecule.drop_wire(source, (x, y), pass)
        })
    }

    pub fn delete_atom(&mut self, id: &UniqueId) -> Result<(), GraphError> {
        let doomed = self
            .current()
            .and_then(|m| m.atom(id))
            .map(Atom::subtree_ids)
            .unwrap_or_default();
        self.edit("deleteAtom", id.to_string(), |molecule, pass| {
            Ok(((), molecule.delete_atom(id, pass)?))
        })?;
        // library entries of the removed atoms are no longer reachable
        self.queue.extend(doomed.into_iter().map(|id| Job {
            path: Vec::new(),
            ticket: 0,
            work: Work::Forget(id),
        }));
        Ok(())
    }

    pub fn delete_connector(&mut self, id: ConnectorId) -> Result<(), GraphError> {
        self.edit("deleteConnector", id.to_string(), |molecule, pass| {
            Ok(((), molecule.delete_connector(id, false, pass)?))
        })
    }

    /// Type a value into an unconnected input
    pub fn set_input_value(
        &mut self,
        atom: &UniqueId,
        name: &str,
        value: Value,
    ) -> Result<(), GraphError> {
        self.edit("setInput", format!("{}.{}", atom, name), |molecule, pass| {
            let idx = molecule.index_or_err(atom)?;
            let input = molecule.atoms[idx].input(name).ok_or_else(|| {
                GraphError::AttachmentPointNotFound {
                    atom: atom.to_string(),
                    name: name.to_string(),
                }
            })?;
            if input.is_connected() {
                return Err(GraphError::Other {
                    message: format!("Input '{}' is driven by a connector", name),
                });
            }
            let expects_number = input.value_type == ValueType::Number;
            let value = match value {
                Value::Text(text) if expects_number => {
                    text.trim()
                        .parse()
                        .map(Value::Number)
                        .map_err(|_| GraphError::TypeMismatch {
                            expected: "number".to_string(),
                            found: format!("text '{}'", text),
                        })?
                }
                other => other,
            };
            Ok(((), molecule.set_input(idx, name, value, pass)))
        })
    }

    /// Edit a type-specific property such as an equation or an Input's type
    pub fn set_property(&mut self, atom: &UniqueId, key: &str, value: Json) -> Result<(), GraphError> {
        self.edit("setProperty", format!("{}.{}", atom, key), |molecule, pass| {
            let idx = molecule.index_or_err(atom)?;
            let target = &mut molecule.atoms[idx];
            let behavior = target.behavior_mut().ok_or_else(|| GraphError::Other {
                message: format!("Molecule {} has no property '{}'", atom, key),
            })?;
            behavior
                .set_property(key, &value)
                .map_err(|message| GraphError::Other { message })?;
            let output = behavior.output();
            if let (Some(current), Some(output)) = (target.output.as_mut(), output) {
                current.value_type = output.value_type;
            }
            target.refresh_name();
            molecule.sync_inputs(idx);
            Ok(((), molecule.update_atom(idx, pass)))
        })
    }

    pub fn rename_atom(&mut self, atom: &UniqueId, name: &str) -> Result<(), GraphError> {
        self.edit("rename", atom.to_string(), |molecule, _| {
            Ok(((), molecule.rename_atom(atom, name)?))
        })
    }

    /// Set the value of a top-level input, as a parent molecule would
    pub fn set_project_input(&mut self, name: &str, value: Value) -> Result<(), GraphError> {
        let root_id = self.root.id.to_string();
        let input = self.root.input_mut(name).ok_or_else(|| {
            GraphError::AttachmentPointNotFound {
                atom: root_id,
                name: name.to_string(),
            }
        })?;
        input.set_value(value.clone());
        self.at_path(Vec::new(), |molecule, pass| {
            Ok(((), molecule.update_value_of(name, Some(value), pass)))
        })
    }

    pub fn select(&mut self, ids: &[UniqueId]) -> Result<(), GraphError> {
        self.in_current(|molecule, pass| {
            molecule.select(ids, pass);
            for atom in molecule.atoms().iter().filter(|a| a.selected && a.output_ready()) {
                if let Some(Value::Geometry(id)) = atom.output.as_ref().map(|ap| &ap.value) {
                    pass.events.push(GraphEvent::Render(RenderEvent::Requested {
                        id: id.clone(),
                    }));
                }
            }
            Ok(((), Vec::new()))
        })
    }

    pub fn copy_selection(&self) -> Option<Json> {
        self.current().map(Molecule::copy_selection)
    }

    /// Paste clipboard JSON into the displayed molecule and select the result
    pub fn paste(&mut self, clipboard: &Json) -> Result<Vec<UniqueId>, GraphError> {
        self.edit("paste", String::new(), |molecule, pass| {
            let (placed, signals) = molecule.paste(clipboard, PASTE_OFFSET, pass)?;
            molecule.select(&placed, pass);
            Ok((placed, signals))
        })
    }

    pub fn move_selected_to_new_molecule(&mut self) -> Result<Option<UniqueId>, GraphError> {
        self.edit("moveToMolecule", String::new(), |molecule, pass| {
            Ok(match molecule.move_selected_to_new_molecule(pass)? {
                Some((id, signals)) => (Some(id), signals),
                None => (None, Vec::new()),
            })
        })
    }

    /// Display a child molecule of the current one
    pub fn enter_molecule(&mut self, id: &UniqueId) -> Result<(), GraphError> {
        let is_molecule = self
            .current()
            .and_then(|m| m.atom(id))
            .ok_or_else(|| GraphError::AtomNotFound { id: id.to_string() })?
            .is_molecule();
        if !is_molecule {
            return Err(GraphError::NotAMolecule { id: id.to_string() });
        }
        self.path.push(id.clone());
        self.navigated();
        Ok(())
    }

    /// Display the parent molecule, releasing any output held while the
    /// child was displayed
    pub fn go_to_parent_molecule(&mut self) -> Result<(), GraphError> {
        let Some(child) = self.path.last().cloned() else {
            return Ok(());
        };
        let pending = self.in_current(|molecule, _| Ok((molecule.take_pending_output(), Vec::new())))?;
        self.path.pop();
        if let Some(value) = pending {
            debug!("Releasing held output of {}", child);
            self.in_current(|molecule, pass| {
                let idx = molecule.index_or_err(&child)?;
                Ok(((), molecule.absorb(idx, vec![Signal::Output(value)], pass)))
            })?;
        }
        self.navigated();
        Ok(())
    }

    fn navigated(&self) {
        info!("Displaying molecule at depth {}", self.path.len());
        self.context
            .bus
            .publish(GraphEvent::Project(ProjectEvent::Navigated {
                path: self.path.clone(),
            }));
    }

    /// Start the packing search of a Cut Layout atom in the displayed molecule
    pub fn compute_layout(&mut self, atom: &UniqueId) -> Result<(), GraphError> {
        self.in_current(|molecule, pass| Ok(((), molecule.start_layout(atom, pass)?)))
    }

    /// Stop a running search; it replies with the best layout found so far
    pub fn cancel_layout(&mut self, atom: &UniqueId) -> bool {
        let mut path = self.path.clone();
        path.push(atom.clone());
        match self.layouts.get(&path) {
            Some((_, cancel)) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Restore the state before the last edit. The live graph is only
    /// replaced once the snapshot has been rebuilt completely.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop() else {
            debug!("Nothing to undo");
            return false;
        };
        let rebuilt = parse_project(&entry.snapshot)
            .map_err(Error::from)
            .and_then(|record| build_root(&record, &self.env).map_err(Error::from));
        match rebuilt {
            Ok(root) => {
                for (_, (_, cancel)) in self.layouts.drain() {
                    cancel.cancel();
                }
                self.root = root;
                self.path.clear();
                info!("Undid {} {}", entry.operation, entry.context);
                self.context
                    .bus
                    .publish(GraphEvent::Project(ProjectEvent::UndoApplied {
                        operation: entry.operation,
                    }));
                self.propagate(false);
                true
            }
            Err(err) => {
                warn!("Undo of {} failed: {}", entry.operation, err);
                self.context
                    .bus
                    .publish(GraphEvent::Project(ProjectEvent::UndoFailed {
                        reason: err.to_string(),
                    }));
                false
            }
        }
    }

    /// Run queued geometry jobs, and the jobs their results trigger, until
    /// none are left
    pub async fn run_until_idle(&mut self) {
        loop {
            self.dispatch();
            tokio::select! {
                biased;
                Some(improvement) = self.improvements_rx.recv() => self.improve(improvement),
                joined = self.in_flight.join_next() => match joined {
                    Some(Ok(completion)) => self.complete(completion),
                    Some(Err(err)) => error!("Geometry task failed: {}", err),
                    None => break,
                },
            }
        }
    }

    fn improve(&mut self, improvement: Improvement) {
        let Improvement {
            path,
            ticket,
            sheets,
        } = improvement;
        let mut pass = self.pass();
        let taken = self
            .root
            .molecule_mut()
            .is_some_and(|molecule| molecule.layout_improved(&path, ticket, &sheets, &mut pass));
        if taken {
            debug!("Layout {} improved to {} sheet(s)", ticket, sheets.len());
            self.finish(pass, Vec::new());
        } else {
            debug!("Dropping placements of finished layout {}", ticket);
        }
    }

    fn dispatch(&mut self) {
        for Job { path, ticket, work } in std::mem::take(&mut self.queue) {
            let service = Arc::clone(&self.context.service);
            match work {
                Work::Request(request) => {
                    if let Some((_, cancel)) = self.layouts.remove(&path) {
                        cancel.cancel();
                    }
                    debug!("Dispatching {} job {}", request.operation(), ticket);
                    self.in_flight.spawn(async move {
                        let outcome = Outcome::Atom(service.call(request).await);
                        Completion { path, ticket, outcome }
                    });
                }
                Work::Layout { input, config } => {
                    let Some(target) = path.last().cloned() else {
                        continue;
                    };
                    let cancel = CancelHandle::new();
                    if let Some((_, previous)) =
                        self.layouts.insert(path.clone(), (ticket, cancel.clone()))
                    {
                        previous.cancel();
                    }
                    let (events, receiver) = mpsc::unbounded_channel();
                    tokio::spawn(forward_layout_events(
                        receiver,
                        Arc::clone(&self.context.bus),
                        self.improvements_tx.clone(),
                        path.clone(),
                        ticket,
                    ));
                    info!("Starting layout for {}", target);
                    self.in_flight.spawn(async move {
                        let request = GeometryRequest::Layout {
                            target,
                            input,
                            config,
                            cancel,
                            events,
                        };
                        let outcome = Outcome::Atom(service.call(request).await);
                        Completion { path, ticket, outcome }
                    });
                }
                Work::Bom(input) => {
                    self.in_flight.spawn(async move {
                        let outcome = Outcome::Bom(
                            match service.call(GeometryRequest::BomList { input }).await {
                                Ok(GeometryReply::BomList(entries)) => Ok(entries),
                                Ok(other) => Err(GeometryError::IncompatibleInputs {
                                    reason: format!("Unexpected reply to BOM request: {:?}", other),
                                }),
                                Err(err) => Err(err),
                            },
                        );
                        Completion { path, ticket, outcome }
                    });
                }
                Work::Forget(id) => {
                    self.in_flight.spawn(async move {
                        if let Err(err) = service.call(GeometryRequest::Delete { id }).await {
                            debug!("Library cleanup skipped: {}", err);
                        }
                        Completion {
                            path,
                            ticket,
                            outcome: Outcome::Forgotten,
                        }
                    });
                }
            }
        }
    }

    fn complete(&mut self, completion: Completion) {
        let Completion {
            path,
            ticket,
            outcome,
        } = completion;
        if self.layouts.get(&path).is_some_and(|(t, _)| *t == ticket) {
            self.layouts.remove(&path);
        }
        let mut pass = self.pass();
        let signals = match outcome {
            Outcome::Forgotten => Vec::new(),
            Outcome::Bom(result) => {
                self.bom_ready(result);
                Vec::new()
            }
            Outcome::Atom(result) if path.is_empty() => {
                self.root_ready(ticket, result, &mut pass);
                Vec::new()
            }
            Outcome::Atom(result) => match self.root.molecule_mut() {
                Some(molecule) => molecule.complete(&path, ticket, result, &mut pass),
                None => Vec::new(),
            },
        };
        self.finish(pass, signals);
    }

    fn root_ready(
        &mut self,
        ticket: u64,
        result: Result<GeometryReply, GeometryError>,
        pass: &mut Pass,
    ) {
        if self.root.ticket != ticket || self.root.state != AtomState::Processing {
            debug!("Dropping stale project output {}", ticket);
            return;
        }
        self.root.state = AtomState::Idle;
        let id = self.root.id.clone();
        match result {
            Ok(_) => {
                if let Some(output) = self.root.output.as_mut() {
                    output.set_value(Value::Geometry(id.clone()));
                }
                self.root.alert = None;
                info!("Project output ready");
                pass.events
                    .push(GraphEvent::Render(RenderEvent::Requested { id: id.clone() }));
                pass.jobs.push(Job {
                    path: Vec::new(),
                    ticket: 0,
                    work: Work::Bom(id),
                });
            }
            Err(err) => {
                error!("Project output failed: {}", err);
                self.root.alert = Some(err.to_string());
                pass.events.push(GraphEvent::Alert(AlertEvent::Raised {
                    atom: id,
                    message: err.to_string(),
                }));
            }
        }
    }

    fn bom_ready(&mut self, result: Result<Vec<BomEntry>, GeometryError>) {
        match result {
            Ok(entries) => {
                let bom = compile_bom(entries);
                info!("Compiled bill of materials with {} item(s)", bom.len());
                if let Some(molecule) = self.root.molecule_mut() {
                    molecule.compiled_bom = bom;
                }
            }
            Err(err) => warn!("Could not compile the bill of materials: {}", err),
        }
    }
}

/// Relay packer progress to the bus, and better placements to the project
/// loop, until the search ends
async fn forward_layout_events(
    mut receiver: mpsc::UnboundedReceiver<LayoutEvent>,
    bus: Arc<EventBus>,
    improvements: mpsc::UnboundedSender<Improvement>,
    path: Vec<UniqueId>,
    ticket: u64,
) {
    let Some(atom) = path.last().cloned() else {
        return;
    };
    while let Some(event) = receiver.recv().await {
        match event {
            LayoutEvent::Progress { fraction, .. } => {
                bus.publish(GraphEvent::Progress(ProgressEvent::Layout {
                    atom: atom.clone(),
                    fraction,
                }));
            }
            LayoutEvent::Warning(message) => debug!("Layout of {}: {}", atom, message),
            LayoutEvent::Placements(sheets) => {
                let _ = improvements.send(Improvement {
                    path: path.clone(),
                    ticket,
                    sheets,
                });
            }
        }
    }
    bus.publish(GraphEvent::Progress(ProgressEvent::Layout {
        atom,
        fraction: 1.0,
    }));
}
