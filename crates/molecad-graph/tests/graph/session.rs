use molecad_core::{EventBus, UniqueId, Units};
use molecad_geometry::GeometryWorker;
use molecad_graph::atoms::{PART_PADDING, PASS_THROUGH, SHEET_HEIGHT, SHEET_WIDTH};
use molecad_graph::{compute_layouts, cut_layouts, problems, AtomType, GraphContext, Project, Value};
use std::path::Path;
use std::sync::Arc;

use crate::support::{fast_settings, output_of};

fn fresh_project() -> Project {
    let context = GraphContext::new(Arc::new(GeometryWorker::spawn()), Arc::new(EventBus::new()));
    Project::new(context, Units::Millimeters)
}

fn reopen(path: &Path) -> (Project, molecad_geometry::GeometryHandle) {
    let geometry = GeometryWorker::spawn();
    let context = GraphContext::new(Arc::new(geometry.clone()), Arc::new(EventBus::new()))
        .with_settings(fast_settings());
    (Project::load(context, path).unwrap(), geometry)
}

/// A molecule holding a rectangle that is nested by a Cut Layout
fn write_nested_layout(path: &Path) -> (UniqueId, UniqueId) {
    let mut project = fresh_project();
    let molecule = project.place_atom(AtomType::Molecule, 0.5, 0.5).unwrap();
    let output = output_of(&project);
    project.connect(&molecule, &output, PASS_THROUGH).unwrap();

    project.enter_molecule(&molecule).unwrap();
    let rect = project.place_atom(AtomType::Rectangle, 0.2, 0.5).unwrap();
    project
        .set_input_value(&rect, "y", Value::Number(5.0))
        .unwrap();
    let cut = project.place_atom(AtomType::CutLayout, 0.5, 0.5).unwrap();
    project.connect(&rect, &cut, "geometry").unwrap();
    for (name, value) in [(SHEET_WIDTH, 100.0), (SHEET_HEIGHT, 100.0), (PART_PADDING, 2.0)] {
        project
            .set_input_value(&cut, name, Value::Number(value))
            .unwrap();
    }
    let inner_output = output_of(&project);
    project.connect(&cut, &inner_output, PASS_THROUGH).unwrap();
    project.go_to_parent_molecule().unwrap();

    project.save(path).unwrap();
    (molecule, cut)
}

#[tokio::test]
async fn test_layouts_inside_molecules_are_found_and_computed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested.maslowcreate");
    let (molecule, cut) = write_nested_layout(&path);

    let (mut project, geometry) = reopen(&path);
    project.run_until_idle().await;
    assert_eq!(cut_layouts(&project), vec![vec![molecule.clone(), cut]]);

    assert_eq!(compute_layouts(&mut project).await.unwrap(), 1);
    assert!(project.current_path().is_empty());
    assert!(problems(&project).is_empty());
    assert_eq!(project.census().to_process, 0);
    assert!(project.output().is_some());
    // the progress logger is gone once the layouts are done
    assert_eq!(project.bus().subscriber_count(), 0);

    let bounds = geometry
        .bounding_box(project.root().id.clone())
        .await
        .unwrap()
        .expect("non-empty");
    assert!((bounds.width() - 10.0).abs() < 1e-3 || (bounds.width() - 5.0).abs() < 1e-3);
    assert!(bounds.width() <= 100.0 && bounds.height() <= 100.0);
}

#[tokio::test]
async fn test_missing_project_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let context = GraphContext::new(Arc::new(GeometryWorker::spawn()), Arc::new(EventBus::new()));
    let result = Project::load(context, dir.path().join("missing.maslowcreate"));
    let err = result.err().expect("missing file");
    assert_eq!(err.to_string(), "Failed to read project file");
}

#[tokio::test]
async fn test_alerts_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.maslowcreate");
    {
        let mut project = fresh_project();
        let rect = project.place_atom(AtomType::Rectangle, 0.2, 0.5).unwrap();
        project
            .set_input_value(&rect, "x", Value::Number(-4.0))
            .unwrap();
        let output = output_of(&project);
        project.connect(&rect, &output, PASS_THROUGH).unwrap();
        project.save(&path).unwrap();
    }

    let (mut project, _geometry) = reopen(&path);
    project.run_until_idle().await;
    let found = problems(&project);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, "Rectangle");
    assert!(project.output().is_none());
}
