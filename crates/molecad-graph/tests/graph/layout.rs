use molecad_core::{EventBus, EventFilter, GraphEvent, ProgressEvent, UniqueId};
use molecad_geometry::Sheets;
use molecad_graph::atoms::{PART_PADDING, PASS_THROUGH, SHEET_HEIGHT, SHEET_WIDTH};
use molecad_graph::{AtomState, AtomType, GraphContext, Project, Value};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::support::{
    output_of, run_until, scripted_project, scripted_search_project, search_sheets,
    slow_worker_project, worker_project, ScriptedSearch, ScriptedService,
};

fn rectangle(project: &mut Project, x: f64, y: f64) -> UniqueId {
    let id = project.place_atom(AtomType::Rectangle, 0.1, 0.5).unwrap();
    project.set_input_value(&id, "x", Value::Number(x)).unwrap();
    project.set_input_value(&id, "y", Value::Number(y)).unwrap();
    id
}

/// Two tagged parts assembled into a Cut Layout on a 100 x 100 sheet
fn layout_project(project: &mut Project) -> UniqueId {
    let big = rectangle(project, 10.0, 5.0);
    let small = rectangle(project, 8.0, 4.0);
    let tag_big = project.place_atom(AtomType::Tag, 0.3, 0.3).unwrap();
    let tag_small = project.place_atom(AtomType::Tag, 0.3, 0.7).unwrap();
    project.connect(&big, &tag_big, "geometry").unwrap();
    project.connect(&small, &tag_small, "geometry").unwrap();

    let assembly = project.place_atom(AtomType::Assembly, 0.5, 0.5).unwrap();
    project.connect(&tag_big, &assembly, "geometry1").unwrap();
    project.connect(&tag_small, &assembly, "geometry2").unwrap();

    let cut = project.place_atom(AtomType::CutLayout, 0.7, 0.5).unwrap();
    project.connect(&assembly, &cut, "geometry").unwrap();
    for (name, value) in [(SHEET_WIDTH, 100.0), (SHEET_HEIGHT, 100.0), (PART_PADDING, 2.0)] {
        project
            .set_input_value(&cut, name, Value::Number(value))
            .unwrap();
    }
    let output = output_of(project);
    project.connect(&cut, &output, PASS_THROUGH).unwrap();
    cut
}

fn stored_placements(project: &Project, cut: &UniqueId) -> Sheets {
    let record = project.current().unwrap().atom(cut).unwrap().to_record();
    serde_json::from_value(record.extra["placements"].clone()).unwrap()
}

#[tokio::test]
async fn test_compute_layout_places_both_parts() {
    let (mut project, geometry) = worker_project();
    let cut = layout_project(&mut project);
    project.run_until_idle().await;
    assert!(stored_placements(&project, &cut).is_empty());

    let mut events = project.bus().receiver();
    project.compute_layout(&cut).unwrap();
    project.run_until_idle().await;

    let sheets = stored_placements(&project, &cut);
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].len(), 2);
    let atom = project.current().unwrap().atom(&cut).unwrap();
    assert!(atom.alert.is_none());
    assert!(atom.warning.is_none());

    let bb = geometry
        .bounding_box(project.root().id.clone())
        .await
        .expect("bounds")
        .expect("non-empty");
    assert!(bb.width() <= 100.0 + 1e-6);
    assert!(bb.height() <= 100.0 + 1e-6);

    // the progress relay finishes with a full bar once the search ends
    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(GraphEvent::Progress(ProgressEvent::Layout { atom, fraction }))
                    if atom == cut && fraction >= 1.0 =>
                {
                    return true
                }
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return false,
            }
        }
    })
    .await;
    assert!(matches!(finished, Ok(true)));
}

#[tokio::test]
async fn test_layout_survives_save_and_reload() {
    let (mut project, geometry) = worker_project();
    let cut = layout_project(&mut project);
    project.run_until_idle().await;
    project.compute_layout(&cut).unwrap();
    project.run_until_idle().await;
    let placed = stored_placements(&project, &cut);
    assert!(!placed.is_empty());

    let json = project.to_json().unwrap();
    let context = GraphContext::new(Arc::new(geometry), Arc::new(EventBus::new()));
    let reloaded = Project::from_json(context, &json).unwrap();
    assert_eq!(stored_placements(&reloaded, &cut), placed);
}

#[test]
fn test_only_cut_layouts_compute_layouts() {
    let mut project = scripted_project(ScriptedService::default());
    let rect = project.place_atom(AtomType::Rectangle, 0.2, 0.5).unwrap();
    assert!(project.compute_layout(&rect).is_err());
    assert!(!project.cancel_layout(&rect));
}

#[tokio::test]
async fn test_layout_is_only_searched_on_request() {
    let service = ScriptedService::default();
    let calls = Arc::clone(&service.calls);
    let mut project = scripted_project(service);
    let cut = layout_project(&mut project);
    project.run_until_idle().await;
    assert!(!calls.lock().unwrap().contains(&"layout"));

    project.compute_layout(&cut).unwrap();
    project.run_until_idle().await;
    assert!(calls.lock().unwrap().contains(&"layout"));
}

fn cut_state(project: &Project, cut: &UniqueId) -> (AtomState, Option<String>) {
    let atom = project.current().unwrap().atom(cut).unwrap();
    (atom.state, atom.alert.clone())
}

#[tokio::test]
async fn test_cancel_layout_keeps_best_placements_so_far() {
    let (mut project, geometry) = slow_worker_project();
    let cut = layout_project(&mut project);
    project.run_until_idle().await;

    let renders = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&renders);
    project
        .bus()
        .subscribe(EventFilter::Atom(cut.clone()), move |event| {
            if matches!(event, GraphEvent::Render(_)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

    project.compute_layout(&cut).unwrap();
    let searching = cut.clone();
    run_until(&mut project, |p| !stored_placements(p, &searching).is_empty()).await;

    // better placements are stored and shown while the search still runs
    assert_eq!(cut_state(&project, &cut).0, AtomState::Processing);
    assert!(renders.load(Ordering::SeqCst) > 0);

    assert!(project.cancel_layout(&cut));
    tokio::time::timeout(Duration::from_secs(10), project.run_until_idle())
        .await
        .expect("search stops after cancel");

    let sheets = stored_placements(&project, &cut);
    assert_eq!(sheets.iter().map(Vec::len).sum::<usize>(), 2);
    assert_eq!(cut_state(&project, &cut), (AtomState::Idle, None));
    assert!(!project.cancel_layout(&cut));
    assert!(geometry
        .bounding_box(cut.clone())
        .await
        .expect("bounds")
        .is_some());
}

#[tokio::test]
async fn test_second_layout_request_replaces_the_first() {
    let service = ScriptedSearch::default();
    let cancels = Arc::clone(&service.cancels);
    let mut project = scripted_search_project(service);
    let cut = layout_project(&mut project);
    project.run_until_idle().await;

    project.compute_layout(&cut).unwrap();
    let id = cut.clone();
    run_until(&mut project, |p| stored_placements(p, &id) == search_sheets(1, 0.0)).await;

    project.compute_layout(&cut).unwrap();
    let id = cut.clone();
    run_until(&mut project, |p| stored_placements(p, &id) == search_sheets(2, 0.0)).await;
    {
        let cancels = cancels.lock().unwrap();
        assert_eq!(cancels.len(), 2);
        assert!(cancels[0].is_cancelled());
        assert!(!cancels[1].is_cancelled());
    }

    assert!(project.cancel_layout(&cut));
    tokio::time::timeout(Duration::from_secs(5), project.run_until_idle())
        .await
        .expect("search stops after cancel");

    // the first search's final reply never lands
    assert_eq!(stored_placements(&project, &cut), search_sheets(2, 1.0));
    assert_eq!(cut_state(&project, &cut), (AtomState::Idle, None));
}

#[tokio::test]
async fn test_moving_a_placed_part_redisplays_the_layout() {
    let (mut project, geometry) = worker_project();
    let cut = layout_project(&mut project);
    project.run_until_idle().await;
    project.compute_layout(&cut).unwrap();
    project.run_until_idle().await;

    project
        .set_property(&cut, "position", json!({"index": 0, "x": 60.0, "y": 60.0}))
        .unwrap();
    project.run_until_idle().await;

    let moved = &stored_placements(&project, &cut)[0][0];
    assert_eq!((moved.translate.x, moved.translate.y), (60.0, 60.0));
    assert_eq!(cut_state(&project, &cut), (AtomState::Idle, None));

    // one part stays packed near the origin, the other now sits far away
    let bb = geometry
        .bounding_box(cut.clone())
        .await
        .expect("bounds")
        .expect("non-empty");
    assert!(bb.width() > 40.0);
    assert!(bb.height() > 40.0);

    assert!(project
        .set_property(&cut, "position", json!({"index": 5, "x": 0.0, "y": 0.0}))
        .is_err());
}
