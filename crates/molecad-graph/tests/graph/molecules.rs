use molecad_core::UniqueId;
use molecad_graph::atoms::PASS_THROUGH;
use molecad_graph::{AtomType, Project, Value};

use crate::support::{output_of, scripted_project, worker_project, ScriptedService};

/// A molecule whose Input drives the diameter of a circle
fn circle_molecule(project: &mut Project) -> UniqueId {
    let molecule = project.place_atom(AtomType::Molecule, 0.5, 0.5).unwrap();
    let output = output_of(project);
    project.connect(&molecule, &output, PASS_THROUGH).unwrap();

    project.enter_molecule(&molecule).unwrap();
    let input = project.place_atom(AtomType::Input, 0.1, 0.5).unwrap();
    let circle = project.place_atom(AtomType::Circle, 0.5, 0.5).unwrap();
    project.connect(&input, &circle, "diameter").unwrap();
    let inner_output = output_of(project);
    project.connect(&circle, &inner_output, PASS_THROUGH).unwrap();
    molecule
}

#[tokio::test]
async fn test_output_is_held_while_the_molecule_is_displayed() {
    let (mut project, geometry) = worker_project();
    let molecule = circle_molecule(&mut project);
    project.run_until_idle().await;

    assert!(project.current().unwrap().is_awaiting_propagation());
    assert!(project.output().is_none());

    project.go_to_parent_molecule().unwrap();
    assert!(project.current_path().is_empty());
    project.run_until_idle().await;

    let root = project.root().id.clone();
    let bb = geometry
        .bounding_box(root.clone())
        .await
        .expect("bounds")
        .expect("non-empty");
    assert!((bb.width() - 10.0).abs() < 1e-3);

    // the Input child shows up as an input of the wrapper
    let wrapper = project.current().unwrap().atom(&molecule).unwrap();
    assert!(wrapper.input("name").is_some());

    project
        .set_input_value(&molecule, "name", Value::Number(20.0))
        .unwrap();
    project.run_until_idle().await;
    let bb = geometry
        .bounding_box(root)
        .await
        .expect("bounds")
        .expect("non-empty");
    assert!((bb.width() - 20.0).abs() < 1e-3);
}

#[test]
fn test_inputs_follow_renames() {
    let mut project = scripted_project(ScriptedService::default());
    let molecule = project.place_atom(AtomType::Molecule, 0.5, 0.5).unwrap();
    project.enter_molecule(&molecule).unwrap();
    let input = project.place_atom(AtomType::Input, 0.1, 0.5).unwrap();
    project.rename_atom(&input, "width").unwrap();
    project.go_to_parent_molecule().unwrap();

    let wrapper = project.current().unwrap().atom(&molecule).unwrap();
    assert!(wrapper.input("width").is_some());
    assert!(wrapper.input("name").is_none());

    project.enter_molecule(&molecule).unwrap();
    project.delete_atom(&input).unwrap();
    project.go_to_parent_molecule().unwrap();
    let wrapper = project.current().unwrap().atom(&molecule).unwrap();
    assert!(wrapper.inputs.is_empty());
}

#[test]
fn test_wire_dropped_on_a_molecule_adds_an_input() {
    let mut project = scripted_project(ScriptedService::default());
    let constant = project.place_atom(AtomType::Constant, 0.2, 0.5).unwrap();
    let molecule = project.place_atom(AtomType::Molecule, 0.6, 0.5).unwrap();

    let connector = project.drop_wire(&constant, 0.6, 0.5).unwrap();
    assert!(connector.is_some());

    let wrapper = project.current().unwrap().atom(&molecule).unwrap();
    let input = wrapper.input("input").expect("new input");
    assert!(input.is_connected());
    let inner = wrapper.molecule().unwrap();
    let child = inner.find(AtomType::Input).expect("child input");
    assert_eq!(child.name, "input");
}

#[test]
fn test_only_molecules_can_be_entered() {
    let mut project = scripted_project(ScriptedService::default());
    let rect = project.place_atom(AtomType::Rectangle, 0.2, 0.5).unwrap();
    assert!(project.enter_molecule(&rect).is_err());
    assert!(project.current_path().is_empty());
    // going up from the top level does nothing
    project.go_to_parent_molecule().unwrap();
    assert!(project.current_path().is_empty());
}

#[test]
fn test_move_selection_into_a_new_molecule() {
    let mut project = scripted_project(ScriptedService::default());
    let rect = project.place_atom(AtomType::Rectangle, 0.2, 0.4).unwrap();
    let extrude = project.place_atom(AtomType::Extrude, 0.4, 0.6).unwrap();
    project.connect(&rect, &extrude, "geometry").unwrap();
    project.select(&[rect.clone(), extrude.clone()]).unwrap();

    let molecule = project
        .move_selected_to_new_molecule()
        .unwrap()
        .expect("selection was not empty");

    let top = project.current().unwrap();
    assert_eq!(top.atoms().len(), 2);
    assert!(top.atom(&rect).is_none());
    let wrapper = top.atom(&molecule).unwrap();
    assert!((wrapper.x - 0.3).abs() < 1e-9);
    assert!((wrapper.y - 0.5).abs() < 1e-9);

    let inner = wrapper.molecule().unwrap();
    assert_eq!(inner.atoms().len(), 3);
    assert_eq!(inner.connectors().len(), 1);
    assert!(inner.find(AtomType::Rectangle).is_some());
    assert!(inner.find(AtomType::Extrude).is_some());
}

#[test]
fn test_moving_nothing_is_a_no_op() {
    let mut project = scripted_project(ScriptedService::default());
    assert_eq!(project.move_selected_to_new_molecule().unwrap(), None);
    assert_eq!(project.current().unwrap().atoms().len(), 1);
}
