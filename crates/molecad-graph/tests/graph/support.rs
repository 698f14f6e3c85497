use async_trait::async_trait;
use molecad_core::{EventBus, GeometryError, UniqueId, Units};
use molecad_geometry::{
    CancelHandle, GeometryHandle, GeometryReply, GeometryRequest, GeometryService, GeometryWorker,
    LayoutConfig, LayoutEvent, LayoutOutcome, Placement, Sheets, Translate,
};
use molecad_graph::{AtomType, GraphContext, GraphSettings, Project};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Accepts every request without touching geometry, failing the named operation
#[derive(Default)]
pub struct ScriptedService {
    pub calls: Arc<Mutex<Vec<&'static str>>>,
    pub fail: Option<&'static str>,
}

#[async_trait]
impl GeometryService for ScriptedService {
    async fn call(&self, request: GeometryRequest) -> Result<GeometryReply, GeometryError> {
        let operation = request.operation();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(operation);
        }
        if self.fail == Some(operation) {
            return Err(GeometryError::Boolean {
                reason: "scripted failure".to_string(),
            });
        }
        Ok(match request {
            GeometryRequest::BomList { .. } => GeometryReply::BomList(Vec::new()),
            _ => GeometryReply::Stored,
        })
    }
}

pub fn scripted_project(service: ScriptedService) -> Project {
    let context = GraphContext::new(Arc::new(service), Arc::new(EventBus::new()));
    Project::new(context, Units::Millimeters)
}

/// Layout search `n` (counting from 1) places part 0 at x = n. It reports
/// that at y = 0 straight away, then runs until cancelled and replies with
/// y = 1. Every other request is accepted as is.
#[derive(Default)]
pub struct ScriptedSearch {
    pub cancels: Arc<Mutex<Vec<CancelHandle>>>,
}

pub fn search_sheets(search: usize, y: f64) -> Sheets {
    vec![vec![Placement {
        id: 0,
        rotate: 0.0,
        translate: Translate {
            x: search as f64,
            y,
        },
    }]]
}

#[async_trait]
impl GeometryService for ScriptedSearch {
    async fn call(&self, request: GeometryRequest) -> Result<GeometryReply, GeometryError> {
        match request {
            GeometryRequest::Layout { cancel, events, .. } => {
                let search = match self.cancels.lock() {
                    Ok(mut cancels) => {
                        cancels.push(cancel.clone());
                        cancels.len()
                    }
                    Err(_) => 0,
                };
                let _ = events.send(LayoutEvent::Placements(search_sheets(search, 0.0)));
                while !cancel.is_cancelled() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                Ok(GeometryReply::Layout(LayoutOutcome {
                    sheets: search_sheets(search, 1.0),
                    part_count: 1,
                    unplaced: 0,
                }))
            }
            GeometryRequest::BomList { .. } => Ok(GeometryReply::BomList(Vec::new())),
            _ => Ok(GeometryReply::Stored),
        }
    }
}

pub fn scripted_search_project(service: ScriptedSearch) -> Project {
    let context = GraphContext::new(Arc::new(service), Arc::new(EventBus::new()));
    Project::new(context, Units::Millimeters)
}

pub fn fast_settings() -> GraphSettings {
    GraphSettings {
        layout: LayoutConfig {
            runtime: Duration::from_millis(300),
            rotations: 4,
            max_generations: Some(3),
            seed: Some(5),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Project backed by a real geometry worker, with the worker handle for queries
pub fn worker_project() -> (Project, GeometryHandle) {
    let handle = GeometryWorker::spawn();
    let context = GraphContext::new(Arc::new(handle.clone()), Arc::new(EventBus::new()))
        .with_settings(fast_settings());
    (Project::new(context, Units::Millimeters), handle)
}

/// Like [`worker_project`], but searches run until cancelled
pub fn slow_worker_project() -> (Project, GeometryHandle) {
    let mut settings = fast_settings();
    settings.layout.runtime = Duration::from_secs(30);
    settings.layout.max_generations = None;
    let handle = GeometryWorker::spawn();
    let context = GraphContext::new(Arc::new(handle.clone()), Arc::new(EventBus::new()))
        .with_settings(settings);
    (Project::new(context, Units::Millimeters), handle)
}

/// Drive the project in short slices until `done` holds
pub async fn run_until(project: &mut Project, mut done: impl FnMut(&Project) -> bool) {
    for _ in 0..200 {
        let _ = tokio::time::timeout(Duration::from_millis(50), project.run_until_idle()).await;
        if done(project) {
            return;
        }
    }
    panic!("project never reached the expected state");
}

pub fn output_of(project: &Project) -> UniqueId {
    project
        .current()
        .and_then(|m| m.find(AtomType::Output))
        .map(|a| a.id.clone())
        .expect("molecule has an output")
}
