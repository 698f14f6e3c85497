use molecad_core::UniqueId;
use molecad_graph::atoms::PASS_THROUGH;
use molecad_graph::{AtomState, AtomType, Census, Value};
use serde_json::json;

use crate::support::{output_of, scripted_project, worker_project, ScriptedService};

#[tokio::test]
async fn test_rectangle_extrude_reaches_project_output() {
    let (mut project, geometry) = worker_project();
    let rect = project.place_atom(AtomType::Rectangle, 0.2, 0.5).unwrap();
    project
        .set_input_value(&rect, "y", Value::Number(5.0))
        .unwrap();
    let extrude = project.place_atom(AtomType::Extrude, 0.4, 0.5).unwrap();
    project
        .set_input_value(&extrude, "height", Value::Text("3".into()))
        .unwrap();
    project.connect(&rect, &extrude, "geometry").unwrap();
    let output = output_of(&project);
    project.connect(&extrude, &output, PASS_THROUGH).unwrap();

    // nothing downstream of a pending job is ready
    let waiting = project.current().unwrap().atom(&extrude).unwrap();
    assert!(!waiting.input("geometry").unwrap().ready);
    assert_eq!(waiting.state, AtomState::WaitingOnInputs);
    assert!(project.output().is_none());
    // the queued rectangle plus the extrude and output waiting behind it
    assert_eq!(
        project.census(),
        Census {
            total: 3,
            to_process: 3
        }
    );

    project.run_until_idle().await;

    let root = project.root().id.clone();
    assert_eq!(project.output(), Some(&Value::Geometry(root.clone())));
    let bb = geometry
        .bounding_box(root)
        .await
        .expect("bounds")
        .expect("non-empty");
    assert!((bb.width() - 10.0).abs() < 1e-3);
    assert!((bb.height() - 5.0).abs() < 1e-3);
    assert!((bb.depth() - 3.0).abs() < 1e-3);
    assert_eq!(
        project.census(),
        Census {
            total: 3,
            to_process: 0
        }
    );
    let extrude = project.current().unwrap().atom(&extrude).unwrap();
    assert!(extrude.alert.is_none());
}

#[tokio::test]
async fn test_editing_an_input_recomputes_downstream() {
    let (mut project, geometry) = worker_project();
    let circle = project.place_atom(AtomType::Circle, 0.2, 0.5).unwrap();
    let output = output_of(&project);
    project.connect(&circle, &output, PASS_THROUGH).unwrap();
    project.run_until_idle().await;

    project
        .set_input_value(&circle, "diameter", Value::Number(24.0))
        .unwrap();
    assert!(project.output().is_none());
    project.run_until_idle().await;

    let bb = geometry
        .bounding_box(project.root().id.clone())
        .await
        .expect("bounds")
        .expect("non-empty");
    assert!((bb.width() - 24.0).abs() < 1e-3);
}

#[test]
fn test_equation_in_the_graph() {
    let mut project = scripted_project(ScriptedService::default());
    let constant = project.place_atom(AtomType::Constant, 0.2, 0.5).unwrap();
    project
        .set_property(&constant, "value", json!(6.0))
        .unwrap();
    let equation = project.place_atom(AtomType::Equation, 0.4, 0.5).unwrap();
    project
        .set_property(&equation, "equation", json!("15 + (y/2)"))
        .unwrap();
    project.connect(&constant, &equation, "y").unwrap();

    let atom = project.current().unwrap().atom(&equation).unwrap();
    assert_eq!(atom.name, "15 + (y/2)");
    let names: Vec<_> = atom.inputs.iter().map(|ap| ap.name.as_str()).collect();
    assert_eq!(names, vec!["y"]);
    assert_eq!(
        atom.output.as_ref().map(|ap| ap.value.clone()),
        Some(Value::Number(18.0))
    );
}

#[test]
fn test_connected_inputs_cannot_be_typed_into() {
    let mut project = scripted_project(ScriptedService::default());
    let constant = project.place_atom(AtomType::Constant, 0.2, 0.5).unwrap();
    let equation = project.place_atom(AtomType::Equation, 0.4, 0.5).unwrap();
    project.connect(&constant, &equation, "x").unwrap();
    assert!(project
        .set_input_value(&equation, "x", Value::Number(2.0))
        .is_err());
    assert!(project
        .set_input_value(&equation, "y", Value::Text("seven".into()))
        .is_err());
}

#[tokio::test]
async fn test_service_failure_raises_an_alert() {
    let mut project = scripted_project(ScriptedService {
        fail: Some("rectangle"),
        ..Default::default()
    });
    let rect = project.place_atom(AtomType::Rectangle, 0.2, 0.5).unwrap();
    let output = output_of(&project);
    project.connect(&rect, &output, PASS_THROUGH).unwrap();
    project.run_until_idle().await;

    let atom = project.current().unwrap().atom(&rect).unwrap();
    assert_eq!(
        atom.alert.as_deref(),
        Some("Boolean operation failed: scripted failure")
    );
    assert!(!atom.output_ready());
    assert!(project.output().is_none());
}

#[tokio::test]
async fn test_superseded_results_are_dropped() {
    let service = ScriptedService::default();
    let mut project = scripted_project(service);
    let rect: UniqueId = project.place_atom(AtomType::Rectangle, 0.2, 0.5).unwrap();
    for x in [11.0, 12.0, 13.0] {
        project
            .set_input_value(&rect, "x", Value::Number(x))
            .unwrap();
    }
    project.run_until_idle().await;
    let atom = project.current().unwrap().atom(&rect).unwrap();
    assert_eq!(atom.state, AtomState::Idle);
    assert!(atom.output_ready());
    assert_eq!(project.census().to_process, 0);
}
