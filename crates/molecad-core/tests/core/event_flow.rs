use molecad_core::{
    AlertEvent, EventBus, EventBusConfig, EventCategory, EventFilter, GraphEvent, ProjectEvent,
    UniqueId,
};
use std::sync::Arc;
use parking_lot::Mutex;

#[test]
fn test_alerts_for_one_atom_arrive_in_order() {
    let bus = EventBus::with_config(EventBusConfig {
        channel_capacity: 16,
    });
    let mut receiver = bus.receiver();
    let atom = UniqueId::from("eq1");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(EventFilter::Atom(atom.clone()), move |event| {
        sink.lock().push(event)
    });

    bus.publish(GraphEvent::Alert(AlertEvent::Raised {
        atom: atom.clone(),
        message: "Unexpected token".to_string(),
    }));
    bus.publish(GraphEvent::Alert(AlertEvent::Raised {
        atom: UniqueId::from("other"),
        message: "Unexpected token".to_string(),
    }));
    bus.publish(GraphEvent::Alert(AlertEvent::Cleared { atom: atom.clone() }));

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert!(matches!(seen[0], GraphEvent::Alert(AlertEvent::Raised { .. })));
    assert!(matches!(seen[1], GraphEvent::Alert(AlertEvent::Cleared { .. })));

    // the broadcast receiver sees everything
    let mut received = 0;
    while receiver.try_recv().is_ok() {
        received += 1;
    }
    assert_eq!(received, 3);
}

#[test]
fn test_handler_receives_project_events() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(
        EventFilter::Categories(vec![EventCategory::Project]),
        move |event| sink.lock().push(event.description()),
    );

    bus.publish(GraphEvent::Project(ProjectEvent::Loaded { atoms: 4 }));
    bus.publish(GraphEvent::Project(ProjectEvent::UndoApplied {
        operation: "placeAtom".to_string(),
    }));

    let seen = seen.lock();
    assert_eq!(seen.as_slice(), ["Project loaded (4 atoms)", "Undid placeAtom"]);
}
