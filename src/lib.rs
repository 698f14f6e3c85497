//! # Molecad
//!
//! A node-graph parametric CAD engine. A project is a graph of atoms
//! (shapes, operations, equations, inputs and outputs) joined by connectors;
//! molecules nest whole graphs inside a single atom. Editing a value
//! recomputes everything downstream through an asynchronous geometry
//! service, and Cut Layout atoms nest the finished parts onto stock sheets.
//!
//! ## Architecture
//!
//! Molecad is organized as a workspace with multiple crates:
//!
//! 1. **molecad-core** - Errors, units, ids, and the graph event bus
//! 2. **molecad-geometry** - Geometry kernel, keyed library, worker, cut layout
//! 3. **molecad-graph** - Atoms, molecules, propagation, undo, project files
//! 4. **molecad-settings** - Configuration files
//! 5. **molecad** - This facade and the headless command line tool

pub use molecad_geometry as geometry;
pub use molecad_graph as graph;
pub use molecad_settings as settings;

pub use molecad_core::{Error, EventBus, GraphEvent, Result, UniqueId, Units};
pub use molecad_geometry::{BoundingBox, GeometryHandle, GeometryWorker};
pub use molecad_graph::{
    compute_layouts, cut_layouts, problems, Atom, AtomType, GraphContext, Project, Value,
};
pub use molecad_settings::Config;

use anyhow::Context;
use molecad_core::{AlertEvent, EventCategory, EventFilter};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support, falling back to `default_level`
pub fn init_logging(default_level: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .with_context(|| format!("Invalid log level '{}'", default_level))?,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Logging is already initialized")?;

    Ok(())
}

/// Project backed by a fresh geometry worker
///
/// Must be called from inside a tokio runtime.
pub fn open_project(
    path: impl AsRef<Path>,
    config: &Config,
) -> anyhow::Result<(Project, GeometryHandle)> {
    let geometry = GeometryWorker::spawn();
    let bus = Arc::new(EventBus::new());
    bus.subscribe(
        EventFilter::Categories(vec![EventCategory::Alert]),
        |event| {
            if let GraphEvent::Alert(AlertEvent::Raised { atom, message }) = event {
                warn!("Atom {} raised an alert: {}", atom, message);
            }
        },
    );
    let context = GraphContext::new(Arc::new(geometry.clone()), bus)
        .with_settings(config.graph_settings());
    let project = Project::load(context, path.as_ref())
        .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
    Ok((project, geometry))
}
