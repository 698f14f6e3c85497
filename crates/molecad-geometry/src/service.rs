//! The geometry service: an asynchronous worker that owns the library.
//!
//! Callers never touch geometry directly. They send a [`GeometryRequest`]
//! naming the library ids to read and the id to write, and await the reply.
//! The worker is a single tokio task, so requests are applied in arrival
//! order. Layout searches run on the blocking pool and report back to the
//! worker when they improve or finish, so other requests keep flowing
//! meanwhile. A search only writes its target while no newer request has
//! written it since the search started.

use async_trait::async_trait;
use molecad_core::{GeometryError, LayoutError, UniqueId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::kernel::{BoundingBox, Profile, Shape};
use crate::layout::{
    self, apply, orientation, orientation::FlatPart, packer::PackObserver, CancelHandle,
    LayoutConfig, LayoutEvent, LayoutOutcome, PreparedLayout, Sheets,
};
use crate::library::GeometryLibrary;
use crate::mesh::{self, DisplayMesh};
use crate::model::{BomEntry, GeometryNode};

const REQUEST_QUEUE: usize = 256;

/// One operation on the library
#[derive(Debug)]
pub enum GeometryRequest {
    Rectangle {
        target: UniqueId,
        x: f64,
        y: f64,
    },
    Circle {
        target: UniqueId,
        diameter: f64,
    },
    RegularPolygon {
        target: UniqueId,
        radius: f64,
        sides: f64,
    },
    Extrude {
        target: UniqueId,
        input: UniqueId,
        height: f64,
    },
    Translate {
        target: UniqueId,
        input: UniqueId,
        x: f64,
        y: f64,
        z: f64,
    },
    Rotate {
        target: UniqueId,
        input: UniqueId,
        x: f64,
        y: f64,
        z: f64,
    },
    Difference {
        target: UniqueId,
        input: UniqueId,
        cutter: UniqueId,
    },
    Tag {
        target: UniqueId,
        input: UniqueId,
        tag: String,
    },
    ExtractTag {
        target: UniqueId,
        input: UniqueId,
        tag: String,
    },
    Assembly {
        target: UniqueId,
        inputs: Vec<UniqueId>,
    },
    AddBom {
        target: UniqueId,
        input: UniqueId,
        entry: BomEntry,
    },
    /// Copy `input` under `target`; used by outputs and molecules
    Copy {
        target: UniqueId,
        input: Option<UniqueId>,
    },
    Layout {
        target: UniqueId,
        input: UniqueId,
        config: LayoutConfig,
        cancel: CancelHandle,
        events: mpsc::UnboundedSender<LayoutEvent>,
    },
    /// Re-apply stored placements without searching
    DisplayLayout {
        target: UniqueId,
        input: UniqueId,
        placements: Sheets,
        config: LayoutConfig,
    },
    BoundingBox {
        input: UniqueId,
    },
    DisplayMesh {
        input: UniqueId,
    },
    BomList {
        input: UniqueId,
    },
    Delete {
        id: UniqueId,
    },
}

impl GeometryRequest {
    /// Name of the operation, for logging
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Rectangle { .. } => "rectangle",
            Self::Circle { .. } => "circle",
            Self::RegularPolygon { .. } => "regularPolygon",
            Self::Extrude { .. } => "extrude",
            Self::Translate { .. } => "move",
            Self::Rotate { .. } => "rotate",
            Self::Difference { .. } => "difference",
            Self::Tag { .. } => "tag",
            Self::ExtractTag { .. } => "extractTag",
            Self::Assembly { .. } => "assembly",
            Self::AddBom { .. } => "addBOM",
            Self::Copy { .. } => "copy",
            Self::Layout { .. } => "layout",
            Self::DisplayLayout { .. } => "displayLayout",
            Self::BoundingBox { .. } => "getBoundingBox",
            Self::DisplayMesh { .. } => "generateDisplayMesh",
            Self::BomList { .. } => "extractBomList",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Result of a request
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryReply {
    /// The result was written to the library
    Stored,
    Layout(LayoutOutcome),
    BoundingBox(Option<BoundingBox>),
    Meshes(Vec<DisplayMesh>),
    BomList(Vec<BomEntry>),
}

/// Asynchronous geometry backend used by the graph
#[async_trait]
pub trait GeometryService: Send + Sync {
    async fn call(&self, request: GeometryRequest) -> Result<GeometryReply, GeometryError>;
}

type Envelope = (GeometryRequest, oneshot::Sender<Result<GeometryReply, GeometryError>>);

/// Cloneable client of a running [`GeometryWorker`]
#[derive(Debug, Clone)]
pub struct GeometryHandle {
    tx: mpsc::Sender<Envelope>,
}

#[async_trait]
impl GeometryService for GeometryHandle {
    async fn call(&self, request: GeometryRequest) -> Result<GeometryReply, GeometryError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| GeometryError::ServiceUnavailable)?;
        reply_rx.await.map_err(|_| GeometryError::ServiceUnavailable)?
    }
}

impl GeometryHandle {
    pub async fn bounding_box(&self, input: UniqueId) -> Result<Option<BoundingBox>, GeometryError> {
        match self.call(GeometryRequest::BoundingBox { input }).await? {
            GeometryReply::BoundingBox(bounds) => Ok(bounds),
            other => Err(unexpected(other)),
        }
    }

    pub async fn display_mesh(&self, input: UniqueId) -> Result<Vec<DisplayMesh>, GeometryError> {
        match self.call(GeometryRequest::DisplayMesh { input }).await? {
            GeometryReply::Meshes(meshes) => Ok(meshes),
            other => Err(unexpected(other)),
        }
    }

    pub async fn bom_list(&self, input: UniqueId) -> Result<Vec<BomEntry>, GeometryError> {
        match self.call(GeometryRequest::BomList { input }).await? {
            GeometryReply::BomList(entries) => Ok(entries),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: GeometryReply) -> GeometryError {
    GeometryError::IncompatibleInputs {
        reason: format!("Unexpected reply from geometry service: {:?}", reply),
    }
}

/// A layout search that finished on the blocking pool
struct LayoutDone {
    target: UniqueId,
    revision: u64,
    sheet_height: f64,
    result: Result<(PreparedLayout, LayoutOutcome), LayoutError>,
    events: mpsc::UnboundedSender<LayoutEvent>,
    reply: oneshot::Sender<Result<GeometryReply, GeometryError>>,
}

/// Messages from running searches back to the worker
enum LayoutNote {
    /// A better layout, already applied to the parts
    Improved {
        target: UniqueId,
        revision: u64,
        node: GeometryNode,
        sheets: Sheets,
        events: mpsc::UnboundedSender<LayoutEvent>,
    },
    Done(LayoutDone),
}

/// Forwards packer notifications: progress straight to the caller, improved
/// layouts through the worker so they are stored before anyone hears of them
struct EventForwarder<'a> {
    parts: &'a [FlatPart],
    sheet_height: f64,
    target: &'a UniqueId,
    revision: u64,
    notes: &'a mpsc::UnboundedSender<LayoutNote>,
    events: &'a mpsc::UnboundedSender<LayoutEvent>,
}

impl PackObserver for EventForwarder<'_> {
    fn progress(&mut self, fraction: f64, cancel: &CancelHandle) {
        let _ = self.events.send(LayoutEvent::Progress {
            fraction,
            cancel: cancel.clone(),
        });
    }

    fn improved(&mut self, sheets: &Sheets) {
        let _ = self.notes.send(LayoutNote::Improved {
            target: self.target.clone(),
            revision: self.revision,
            node: apply::apply_layout(self.parts, sheets, self.sheet_height),
            sheets: sheets.clone(),
            events: self.events.clone(),
        });
    }
}

/// Owner of the geometry library
pub struct GeometryWorker {
    library: GeometryLibrary,
    notes_tx: mpsc::UnboundedSender<LayoutNote>,
}

impl GeometryWorker {
    /// Start the worker task and return a handle to it. The task ends once
    /// every handle is dropped and no layout is still running.
    pub fn spawn() -> GeometryHandle {
        let (tx, mut rx) = mpsc::channel::<Envelope>(REQUEST_QUEUE);
        let (notes_tx, mut notes_rx) = mpsc::unbounded_channel::<LayoutNote>();

        tokio::spawn(async move {
            let mut worker = GeometryWorker {
                library: GeometryLibrary::new(),
                notes_tx,
            };
            let mut pending = 0usize;
            let mut open = true;

            while open || pending > 0 {
                tokio::select! {
                    request = rx.recv(), if open => match request {
                        Some((request, reply)) => {
                            if worker.dispatch(request, reply) {
                                pending += 1;
                            }
                        }
                        None => open = false,
                    },
                    Some(note) = notes_rx.recv() => match note {
                        LayoutNote::Improved { target, revision, node, sheets, events } => {
                            worker.improve_layout(target, revision, node, sheets, events);
                        }
                        LayoutNote::Done(done) => {
                            pending -= 1;
                            worker.finish_layout(done);
                        }
                    },
                }
            }
            debug!("Geometry worker stopped");
        });

        GeometryHandle { tx }
    }

    /// Handle a request. Returns true when a layout search was started and
    /// the reply will be sent on completion.
    fn dispatch(
        &mut self,
        request: GeometryRequest,
        reply: oneshot::Sender<Result<GeometryReply, GeometryError>>,
    ) -> bool {
        match request {
            GeometryRequest::Layout {
                target,
                input,
                config,
                cancel,
                events,
            } => self.start_layout(target, &input, config, cancel, events, reply),
            request => {
                let operation = request.operation();
                let result = self.handle(request);
                if let Err(err) = &result {
                    debug!("Geometry operation {} failed: {}", operation, err);
                }
                let _ = reply.send(result);
                false
            }
        }
    }

    fn input(&self, id: &UniqueId) -> Result<&GeometryNode, GeometryError> {
        self.library.get(id)
    }

    fn store(&mut self, target: UniqueId, node: GeometryNode) -> Result<GeometryReply, GeometryError> {
        self.library.insert(target, node);
        Ok(GeometryReply::Stored)
    }

    fn handle(&mut self, request: GeometryRequest) -> Result<GeometryReply, GeometryError> {
        match request {
            GeometryRequest::Rectangle { target, x, y } => {
                positive("rectangle", "x", x)?;
                positive("rectangle", "y", y)?;
                self.store(target, Shape::sketch(vec![Profile::rectangle(x, y)]).into())
            }
            GeometryRequest::Circle { target, diameter } => {
                positive("circle", "diameter", diameter)?;
                self.store(target, Shape::sketch(vec![Profile::circle(diameter)]).into())
            }
            GeometryRequest::RegularPolygon {
                target,
                radius,
                sides,
            } => {
                positive("regularPolygon", "radius", radius)?;
                if !sides.is_finite() || sides.round() < 3.0 {
                    return Err(GeometryError::InvalidDimension {
                        operation: "regularPolygon".to_string(),
                        parameter: "number of sides".to_string(),
                        value: sides,
                    });
                }
                let shape = Shape::sketch(vec![Profile::regular_polygon(radius, sides.round() as usize)]);
                self.store(target, shape.into())
            }
            GeometryRequest::Extrude {
                target,
                input,
                height,
            } => {
                let node = self
                    .input(&input)?
                    .act_on_leaves(&|part| Ok(part.with_shape(part.shape.extrude(height)?)))?;
                self.store(target, node)
            }
            GeometryRequest::Translate {
                target,
                input,
                x,
                y,
                z,
            } => {
                let node = self
                    .input(&input)?
                    .act_on_leaves(&|part| Ok(part.with_shape(part.shape.translated(x, y, z))))?;
                self.store(target, node)
            }
            GeometryRequest::Rotate {
                target,
                input,
                x,
                y,
                z,
            } => {
                let node = self
                    .input(&input)?
                    .act_on_leaves(&|part| Ok(part.with_shape(part.shape.rotated(x, y, z))))?;
                self.store(target, node)
            }
            GeometryRequest::Difference {
                target,
                input,
                cutter,
            } => {
                let node = self.input(&input)?.difference(self.input(&cutter)?)?;
                self.store(target, node)
            }
            GeometryRequest::Tag { target, input, tag } => {
                let node = self.input(&input)?.tagged(&[tag]);
                self.store(target, node)
            }
            GeometryRequest::ExtractTag { target, input, tag } => {
                let node = self
                    .input(&input)?
                    .extract_tag(&tag)
                    .ok_or(GeometryError::TagNotFound { tag })?;
                self.store(target, node)
            }
            GeometryRequest::Assembly { target, inputs } => {
                let nodes = inputs
                    .iter()
                    .map(|id| self.input(id).cloned())
                    .collect::<Result<Vec<_>, _>>()?;
                self.store(target, GeometryNode::assembly(&nodes)?)
            }
            GeometryRequest::AddBom {
                target,
                input,
                entry,
            } => {
                let node = self.input(&input)?.with_bom_entry(entry);
                self.store(target, node)
            }
            GeometryRequest::Copy { target, input } => {
                let input = input.ok_or(GeometryError::NothingConnected)?;
                let node = self
                    .library
                    .get(&input)
                    .map_err(|_| GeometryError::NothingConnected)?
                    .clone();
                self.store(target, node)
            }
            GeometryRequest::DisplayLayout {
                target,
                input,
                placements,
                config,
            } => {
                let parts = orientation::rotate_for_layout(self.input(&input)?, &config)?;
                self.store(target, apply::apply_layout(&parts, &placements, config.height))
            }
            GeometryRequest::BoundingBox { input } => {
                Ok(GeometryReply::BoundingBox(self.input(&input)?.bounding_box()))
            }
            GeometryRequest::DisplayMesh { input } => {
                Ok(GeometryReply::Meshes(mesh::display_meshes(self.input(&input)?)))
            }
            GeometryRequest::BomList { input } => Ok(GeometryReply::BomList(self.input(&input)?.bom().to_vec())),
            GeometryRequest::Delete { id } => {
                self.library.remove(&id);
                Ok(GeometryReply::Stored)
            }
            GeometryRequest::Layout { .. } => Err(GeometryError::IncompatibleInputs {
                reason: "Layout requests are dispatched separately".to_string(),
            }),
        }
    }

    fn start_layout(
        &mut self,
        target: UniqueId,
        input: &UniqueId,
        config: LayoutConfig,
        cancel: CancelHandle,
        events: mpsc::UnboundedSender<LayoutEvent>,
        reply: oneshot::Sender<Result<GeometryReply, GeometryError>>,
    ) -> bool {
        let prepared = match self
            .input(input)
            .and_then(|node| layout::prepare(node, &config).map_err(GeometryError::from))
        {
            Ok(prepared) => prepared,
            Err(err) => {
                debug!("Layout could not start: {}", err);
                let _ = reply.send(Err(err));
                return false;
            }
        };
        info!(
            "Starting layout of {} part(s) on {} x {} sheets",
            prepared.parts.len(),
            config.width,
            config.height
        );

        let revision = self.library.reserve(&target);
        let notes = self.notes_tx.clone();
        tokio::spawn(async move {
            let sheet_height = config.height;
            let (search_target, search_notes, search_events) =
                (target.clone(), notes.clone(), events.clone());
            let joined = tokio::task::spawn_blocking(move || {
                let outcome = {
                    let mut observer = EventForwarder {
                        parts: &prepared.parts,
                        sheet_height,
                        target: &search_target,
                        revision,
                        notes: &search_notes,
                        events: &search_events,
                    };
                    layout::compute_positions(&prepared, &config, &cancel, &mut observer)
                };
                outcome.map(|outcome| (prepared, outcome))
            })
            .await;

            let result = joined.unwrap_or_else(|err| {
                warn!("Layout task failed: {}", err);
                Err(LayoutError::Cancelled)
            });
            let _ = notes.send(LayoutNote::Done(LayoutDone {
                target,
                revision,
                sheet_height,
                result,
                events,
                reply,
            }));
        });
        true
    }

    fn improve_layout(
        &mut self,
        target: UniqueId,
        revision: u64,
        node: GeometryNode,
        sheets: Sheets,
        events: mpsc::UnboundedSender<LayoutEvent>,
    ) {
        if self.library.insert_if_current(target.clone(), revision, node) {
            let _ = events.send(LayoutEvent::Placements(sheets));
        } else {
            debug!("Ignoring improved layout of {}, a newer result was stored", target);
        }
    }

    fn finish_layout(&mut self, done: LayoutDone) {
        let LayoutDone {
            target,
            revision,
            sheet_height,
            result,
            events,
            reply,
        } = done;

        let result = result.map_err(GeometryError::from).and_then(|(prepared, outcome)| {
            let node = apply::apply_layout(&prepared.parts, &outcome.sheets, sheet_height);
            if !self.library.insert_if_current(target.clone(), revision, node) {
                debug!("Dropping layout of {}, a newer result was stored", target);
                return Err(LayoutError::Superseded.into());
            }
            if outcome.unplaced > 0 {
                let message = layout::unplaced_warning(outcome.unplaced);
                warn!("{}", message);
                let _ = events.send(LayoutEvent::Warning(message));
            }
            info!(
                "Layout placed {} of {} part(s) on {} sheet(s)",
                outcome.placed(),
                outcome.part_count,
                outcome.sheets.len()
            );
            Ok(GeometryReply::Layout(outcome))
        });
        let _ = reply.send(result);
    }
}

fn positive(operation: &str, parameter: &str, value: f64) -> Result<(), GeometryError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidDimension {
            operation: operation.to_string(),
            parameter: parameter.to_string(),
            value,
        })
    }
}
