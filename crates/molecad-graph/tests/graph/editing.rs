use molecad_core::{GraphError, GraphEvent, SelectionEvent};
use molecad_graph::atoms::PASS_THROUGH;
use molecad_graph::{AtomType, Value};
use serde_json::json;

use crate::support::{output_of, scripted_project, ScriptedService};

#[test]
fn test_a_second_output_replaces_the_first() {
    let mut project = scripted_project(ScriptedService::default());
    let first = output_of(&project);
    let second = project.place_atom(AtomType::Output, 0.8, 0.2).unwrap();
    let molecule = project.current().unwrap();
    let outputs: Vec<_> = molecule
        .atoms()
        .iter()
        .filter(|a| a.atom_type() == AtomType::Output)
        .map(|a| a.id.clone())
        .collect();
    assert_eq!(outputs, vec![second]);
    assert!(molecule.atom(&first).is_none());
}

#[test]
fn test_connector_rules() {
    let mut project = scripted_project(ScriptedService::default());
    let a = project.place_atom(AtomType::Constant, 0.1, 0.5).unwrap();
    let b = project.place_atom(AtomType::Constant, 0.1, 0.7).unwrap();
    let eq = project.place_atom(AtomType::Equation, 0.4, 0.5).unwrap();

    project.connect(&a, &eq, "x").unwrap();
    assert!(matches!(
        project.connect(&b, &eq, "x"),
        Err(GraphError::InputAlreadyConnected { .. })
    ));
    assert!(matches!(
        project.connect(&eq, &eq, "y"),
        Err(GraphError::SelfConnection { .. })
    ));
    assert!(matches!(
        project.connect(&a, &eq, "z"),
        Err(GraphError::AttachmentPointNotFound { .. })
    ));
    assert_eq!(project.current().unwrap().connectors().len(), 1);
}

#[test]
fn test_deleting_an_atom_removes_its_connectors() {
    let mut project = scripted_project(ScriptedService::default());
    let constant = project.place_atom(AtomType::Constant, 0.1, 0.5).unwrap();
    project
        .set_property(&constant, "value", json!(4.0))
        .unwrap();
    let eq = project.place_atom(AtomType::Equation, 0.4, 0.5).unwrap();
    project.connect(&constant, &eq, "x").unwrap();
    let result = |project: &molecad_graph::Project| {
        project
            .current()
            .and_then(|m| m.atom(&eq))
            .and_then(|a| a.output.as_ref())
            .map(|ap| ap.value.clone())
    };
    assert_eq!(result(&project), Some(Value::Number(5.0)));

    project.delete_atom(&constant).unwrap();
    assert!(project.current().unwrap().connectors().is_empty());
    // the orphaned input falls back to its default
    assert_eq!(result(&project), Some(Value::Number(2.0)));
}

#[test]
fn test_delete_connector() {
    let mut project = scripted_project(ScriptedService::default());
    let constant = project.place_atom(AtomType::Constant, 0.1, 0.5).unwrap();
    let eq = project.place_atom(AtomType::Equation, 0.4, 0.5).unwrap();
    let id = project.connect(&constant, &eq, "y").unwrap();
    project.delete_connector(id).unwrap();
    let atom = project.current().unwrap().atom(&eq).unwrap();
    assert!(!atom.input("y").unwrap().is_connected());
    assert!(project.delete_connector(id).is_err());
}

#[test]
fn test_copy_and_paste_selection() {
    let mut project = scripted_project(ScriptedService::default());
    let constant = project.place_atom(AtomType::Constant, 0.1, 0.5).unwrap();
    let eq = project.place_atom(AtomType::Equation, 0.4, 0.5).unwrap();
    project.connect(&constant, &eq, "x").unwrap();
    project.select(&[constant.clone(), eq.clone()]).unwrap();

    let clipboard = project.copy_selection().unwrap();
    let mut events = project.bus().receiver();
    let pasted = project.paste(&clipboard).unwrap();

    assert_eq!(pasted.len(), 2);
    assert!(!pasted.contains(&constant));
    assert!(!pasted.contains(&eq));
    let molecule = project.current().unwrap();
    assert_eq!(molecule.atoms().len(), 5);
    assert_eq!(molecule.connectors().len(), 2);
    assert_eq!(molecule.selected_ids().len(), 2);
    for id in &pasted {
        let atom = molecule.atom(id).unwrap();
        assert!(atom.selected);
        assert!(atom.x > 0.1);
    }

    let selection_changed = std::iter::from_fn(|| events.try_recv().ok()).any(|event| {
        matches!(event, GraphEvent::Selection(SelectionEvent::Changed { selected }) if selected.len() == 2)
    });
    assert!(selection_changed);
}

#[test]
fn test_paste_rejects_foreign_clipboard() {
    let mut project = scripted_project(ScriptedService::default());
    assert!(project.paste(&json!({ "hello": "world" })).is_err());
    assert!(!project.can_undo());
}

#[test]
fn test_unknown_atoms_and_inputs_are_errors() {
    let mut project = scripted_project(ScriptedService::default());
    let rect = project.place_atom(AtomType::Rectangle, 0.1, 0.5).unwrap();
    assert!(project
        .set_input_value(&rect, "depth", Value::Number(1.0))
        .is_err());
    let missing = molecad_core::UniqueId::from("nope");
    assert!(matches!(
        project.delete_atom(&missing),
        Err(GraphError::AtomNotFound { .. })
    ));
    assert!(project
        .set_property(&rect, "equation", json!("x"))
        .is_err());
}

#[test]
fn test_dropping_a_wire_on_an_input() {
    let mut project = scripted_project(ScriptedService::default());
    let circle = project.place_atom(AtomType::Circle, 0.2, 0.5).unwrap();
    let output = output_of(&project);
    let target = project.current().unwrap().atom(&output).unwrap();
    let (x, y) = target.input_position(0);
    let connector = project.drop_wire(&circle, x, y).unwrap();
    assert!(connector.is_some());
    let target = project.current().unwrap().atom(&output).unwrap();
    assert!(target.input(PASS_THROUGH).unwrap().is_connected());
}
