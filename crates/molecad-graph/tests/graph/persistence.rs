use molecad_core::{Error, EventBus, GraphEvent, ProjectError, ProjectEvent, Units};
use molecad_graph::atoms::PASS_THROUGH;
use molecad_graph::{AtomType, GraphContext, Project, Value, FILE_TYPE_VERSION};
use serde_json::json;
use std::sync::Arc;

use crate::support::{output_of, scripted_project, ScriptedService};

fn scripted_context() -> GraphContext {
    GraphContext::new(
        Arc::new(ScriptedService::default()),
        Arc::new(EventBus::new()),
    )
}

#[test]
fn test_save_and_load_round_trip() {
    let mut project = scripted_project(ScriptedService::default());
    let circle = project.place_atom(AtomType::Circle, 0.3, 0.4).unwrap();
    project
        .set_input_value(&circle, "diameter", Value::Number(42.0))
        .unwrap();
    let output = output_of(&project);
    project.connect(&circle, &output, PASS_THROUGH).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bracket.maslowcreate");
    project.save(&path).unwrap();

    let loaded = Project::load(scripted_context(), &path).unwrap();
    assert_eq!(loaded.root().id, project.root().id);
    assert_eq!(loaded.to_json().unwrap(), project.to_json().unwrap());

    let atom = loaded.current().unwrap().atom(&circle).unwrap();
    assert_eq!(atom.input("diameter").unwrap().value, Value::Number(42.0));
    assert_eq!(loaded.current().unwrap().connectors().len(), 1);
}

#[test]
fn test_document_layout() {
    let project = scripted_project(ScriptedService::default());
    let json: serde_json::Value = serde_json::from_str(&project.to_json().unwrap()).unwrap();
    assert_eq!(json["atomType"], "Molecule");
    assert_eq!(json["topLevel"], true);
    assert_eq!(json["unitsKey"], "MM");
    assert_eq!(json["fileTypeVersion"], FILE_TYPE_VERSION);
    assert_eq!(json["allAtoms"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["allAtoms"][0]["atomType"], "Output");
}

#[test]
fn test_units_come_from_the_document() {
    let text = json!({
        "atomType": "Molecule",
        "uniqueID": "1",
        "topLevel": true,
        "unitsKey": "Inches",
        "allAtoms": [],
        "allConnectors": [],
        "fileTypeVersion": 1
    })
    .to_string();
    let project = Project::from_json(scripted_context(), &text).unwrap();
    assert_eq!(project.units(), Units::Inches);
    // a document without an Output gets one
    assert!(project.current().unwrap().find(AtomType::Output).is_some());
}

#[test]
fn test_broken_documents_are_rejected() {
    let newer = json!({
        "atomType": "Molecule",
        "allAtoms": [],
        "allConnectors": [],
        "fileTypeVersion": FILE_TYPE_VERSION + 1
    })
    .to_string();
    assert!(matches!(
        Project::from_json(scripted_context(), &newer),
        Err(Error::Project(ProjectError::UnsupportedVersion { .. }))
    ));
    assert!(Project::from_json(scripted_context(), "{ not json").is_err());

    let dir = tempfile::tempdir().unwrap();
    assert!(Project::load(scripted_context(), dir.path().join("missing.json")).is_err());
}

#[test]
fn test_undo_restores_the_previous_graph() {
    let mut project = scripted_project(ScriptedService::default());
    let before = project.to_json().unwrap();
    assert!(!project.can_undo());

    project.place_atom(AtomType::Rectangle, 0.2, 0.5).unwrap();
    assert!(project.can_undo());
    assert_eq!(project.current().unwrap().atoms().len(), 2);

    let mut events = project.bus().receiver();
    assert!(project.undo());
    assert_eq!(project.current().unwrap().atoms().len(), 1);
    assert_eq!(project.to_json().unwrap(), before);
    assert!(matches!(
        events.try_recv(),
        Ok(GraphEvent::Project(ProjectEvent::UndoApplied { .. }))
    ));
}

#[test]
fn test_undo_with_empty_history_is_a_no_op() {
    let mut project = scripted_project(ScriptedService::default());
    let before = project.to_json().unwrap();
    assert!(!project.undo());
    assert_eq!(project.to_json().unwrap(), before);
}

#[test]
fn test_failed_edits_leave_no_history() {
    let mut project = scripted_project(ScriptedService::default());
    let rect = project.place_atom(AtomType::Rectangle, 0.2, 0.5).unwrap();
    assert!(project.connect(&rect, &rect, "x").is_err());
    assert!(project.undo());
    assert!(!project.can_undo());
}

#[test]
fn test_history_depth_is_bounded() {
    let mut project = scripted_project(ScriptedService::default());
    for i in 0..8 {
        project
            .place_atom(AtomType::Constant, 0.1 * f64::from(i), 0.5)
            .unwrap();
    }
    let mut undone = 0;
    while project.undo() {
        undone += 1;
    }
    assert_eq!(undone, 5);
    assert_eq!(project.current().unwrap().atoms().len(), 4);
}
