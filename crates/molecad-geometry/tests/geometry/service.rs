use molecad_core::{GeometryError, LayoutError, UniqueId};
use molecad_geometry::{
    BomEntry, CancelHandle, GeometryReply, GeometryRequest, GeometryService, GeometryWorker,
    LayoutConfig, LayoutEvent,
};
use std::time::Duration;
use tokio::sync::mpsc;

fn id(s: &str) -> UniqueId {
    UniqueId::from(s)
}

fn layout_config(width: f64, height: f64) -> LayoutConfig {
    LayoutConfig {
        width,
        height,
        part_padding: 2.0,
        runtime: Duration::from_millis(300),
        rotations: 4,
        max_generations: Some(3),
        seed: Some(5),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_rectangle_extrude_bounding_box() {
    let service = GeometryWorker::spawn();
    service
        .call(GeometryRequest::Rectangle {
            target: id("r"),
            x: 10.0,
            y: 5.0,
        })
        .await
        .expect("rectangle");
    service
        .call(GeometryRequest::Extrude {
            target: id("e"),
            input: id("r"),
            height: 3.0,
        })
        .await
        .expect("extrude");

    let bb = service.bounding_box(id("e")).await.expect("bounds").expect("non-empty");
    assert!((bb.width() - 10.0).abs() < 1e-3);
    assert!((bb.height() - 5.0).abs() < 1e-3);
    assert!((bb.depth() - 3.0).abs() < 1e-3);
}

#[tokio::test]
async fn test_missing_input_is_reported() {
    let service = GeometryWorker::spawn();
    let err = service
        .call(GeometryRequest::Extrude {
            target: id("e"),
            input: id("nope"),
            height: 3.0,
        })
        .await
        .unwrap_err();
    assert_eq!(err, GeometryError::NotFound { id: "nope".to_string() });
}

#[tokio::test]
async fn test_invalid_dimensions_are_rejected() {
    let service = GeometryWorker::spawn();
    let err = service
        .call(GeometryRequest::Circle {
            target: id("c"),
            diameter: -1.0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GeometryError::InvalidDimension { .. }));

    let err = service
        .call(GeometryRequest::RegularPolygon {
            target: id("p"),
            radius: 5.0,
            sides: 2.0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GeometryError::InvalidDimension { .. }));
}

#[tokio::test]
async fn test_output_copy_needs_a_connection() {
    let service = GeometryWorker::spawn();
    let err = service
        .call(GeometryRequest::Copy {
            target: id("out"),
            input: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Nothing is connected to the output");
}

#[tokio::test]
async fn test_tag_extract_and_bom() {
    let service = GeometryWorker::spawn();
    for (target, x) in [("a", 4.0), ("b", 2.0)] {
        service
            .call(GeometryRequest::Rectangle {
                target: id(target),
                x,
                y: x,
            })
            .await
            .expect("rectangle");
    }
    service
        .call(GeometryRequest::Tag {
            target: id("ta"),
            input: id("a"),
            tag: "cut".to_string(),
        })
        .await
        .expect("tag");
    service
        .call(GeometryRequest::AddBom {
            target: id("bb"),
            input: id("b"),
            entry: BomEntry::new("hinge", 2.0, 3.5, "store"),
        })
        .await
        .expect("bom");
    service
        .call(GeometryRequest::Translate {
            target: id("mb"),
            input: id("bb"),
            x: 20.0,
            y: 0.0,
            z: 0.0,
        })
        .await
        .expect("move");
    service
        .call(GeometryRequest::Assembly {
            target: id("asm"),
            inputs: vec![id("ta"), id("mb")],
        })
        .await
        .expect("assembly");

    let bom = service.bom_list(id("asm")).await.expect("bom list");
    assert_eq!(bom.len(), 1);
    assert_eq!(bom[0].item, "hinge");

    service
        .call(GeometryRequest::ExtractTag {
            target: id("only"),
            input: id("asm"),
            tag: "cut".to_string(),
        })
        .await
        .expect("extract");
    let bb = service.bounding_box(id("only")).await.expect("bounds").expect("non-empty");
    assert!((bb.width() - 4.0).abs() < 1e-9);

    let err = service
        .call(GeometryRequest::ExtractTag {
            target: id("none"),
            input: id("asm"),
            tag: "paint".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Tag not found: paint");
}

#[tokio::test]
async fn test_layout_streams_events_and_stores_result() {
    let service = GeometryWorker::spawn();
    for (target, x, y) in [("p1", 10.0, 5.0), ("p2", 8.0, 4.0)] {
        service
            .call(GeometryRequest::Rectangle {
                target: id(target),
                x,
                y,
            })
            .await
            .expect("rectangle");
    }
    service
        .call(GeometryRequest::Translate {
            target: id("p2m"),
            input: id("p2"),
            x: 30.0,
            y: 0.0,
            z: 0.0,
        })
        .await
        .expect("move");
    service
        .call(GeometryRequest::Assembly {
            target: id("parts"),
            inputs: vec![id("p1"), id("p2m")],
        })
        .await
        .expect("assembly");

    let (events, mut rx) = mpsc::unbounded_channel();
    let reply = service
        .call(GeometryRequest::Layout {
            target: id("laid"),
            input: id("parts"),
            config: layout_config(100.0, 100.0),
            cancel: CancelHandle::new(),
            events,
        })
        .await
        .expect("layout");
    let GeometryReply::Layout(outcome) = reply else {
        panic!("expected a layout reply, got {:?}", reply);
    };
    assert_eq!(outcome.placed(), 2);

    let mut saw_progress = false;
    let mut saw_placements = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            LayoutEvent::Progress { .. } => saw_progress = true,
            LayoutEvent::Placements(_) => saw_placements = true,
            LayoutEvent::Warning(w) => panic!("unexpected warning {}", w),
        }
    }
    assert!(saw_progress && saw_placements);

    let bb = service.bounding_box(id("laid")).await.expect("bounds").expect("non-empty");
    assert!(bb.max.x <= 100.0 + 1e-6 && bb.max.y <= 100.0 + 1e-6);
    assert!(bb.min.x >= -1e-6 && bb.min.y >= -1e-6);

    let replay = service
        .call(GeometryRequest::DisplayLayout {
            target: id("replayed"),
            input: id("parts"),
            placements: outcome.sheets.clone(),
            config: layout_config(100.0, 100.0),
        })
        .await
        .expect("display layout");
    assert_eq!(replay, GeometryReply::Stored);
    let replayed = service.bounding_box(id("replayed")).await.expect("bounds");
    assert_eq!(replayed, Some(bb));
}

#[tokio::test]
async fn test_layout_on_tiny_sheet_fails() {
    let service = GeometryWorker::spawn();
    service
        .call(GeometryRequest::Rectangle {
            target: id("big"),
            x: 50.0,
            y: 50.0,
        })
        .await
        .expect("rectangle");
    let (events, _rx) = mpsc::unbounded_channel();
    let err = service
        .call(GeometryRequest::Layout {
            target: id("laid"),
            input: id("big"),
            config: layout_config(10.0, 10.0),
            cancel: CancelHandle::new(),
            events,
        })
        .await
        .unwrap_err();
    assert_eq!(err, GeometryError::Layout(LayoutError::NothingPlaced));
    assert_eq!(
        err.to_string(),
        "Failed to place any parts. Are sheet dimensions right?"
    );
}

#[tokio::test]
async fn test_meshes_and_delete() {
    let service = GeometryWorker::spawn();
    service
        .call(GeometryRequest::Circle {
            target: id("c"),
            diameter: 6.0,
        })
        .await
        .expect("circle");
    let meshes = service.display_mesh(id("c")).await.expect("mesh");
    assert_eq!(meshes.len(), 1);
    assert!(!meshes[0].edges.is_empty());

    service
        .call(GeometryRequest::Delete { id: id("c") })
        .await
        .expect("delete");
    assert!(service.display_mesh(id("c")).await.is_err());
}

/// Six rectangles assembled under "parts", and a slow search config
async fn slow_layout_input(service: &molecad_geometry::GeometryHandle) -> LayoutConfig {
    let mut inputs = Vec::new();
    for i in 0..6 {
        let name = format!("r{}", i);
        service
            .call(GeometryRequest::Rectangle {
                target: id(&name),
                x: 12.0 + i as f64,
                y: 7.0,
            })
            .await
            .expect("rectangle");
        inputs.push(id(&name));
    }
    service
        .call(GeometryRequest::Assembly {
            target: id("parts"),
            inputs,
        })
        .await
        .expect("assembly");

    LayoutConfig {
        runtime: Duration::from_secs(20),
        max_generations: None,
        ..layout_config(100.0, 100.0)
    }
}

async fn first_placements(rx: &mut mpsc::UnboundedReceiver<LayoutEvent>) {
    while let Some(event) = rx.recv().await {
        if matches!(event, LayoutEvent::Placements(_)) {
            return;
        }
    }
    panic!("layout ended without placements");
}

#[tokio::test]
async fn test_cancelled_layout_does_not_overwrite_newer_result() {
    let service = GeometryWorker::spawn();
    let config = slow_layout_input(&service).await;
    service
        .call(GeometryRequest::Rectangle {
            target: id("small"),
            x: 1.0,
            y: 1.0,
        })
        .await
        .expect("rectangle");

    let (events, mut rx) = mpsc::unbounded_channel();
    let cancel = CancelHandle::new();
    let search = tokio::spawn({
        let service = service.clone();
        let cancel = cancel.clone();
        async move {
            service
                .call(GeometryRequest::Layout {
                    target: id("cut"),
                    input: id("parts"),
                    config,
                    cancel,
                    events,
                })
                .await
        }
    });
    tokio::time::timeout(Duration::from_secs(10), first_placements(&mut rx))
        .await
        .expect("placements in time");

    service
        .call(GeometryRequest::Copy {
            target: id("cut"),
            input: Some(id("small")),
        })
        .await
        .expect("copy");
    cancel.cancel();

    let stale = search.await.expect("join");
    assert_eq!(stale, Err(GeometryError::Layout(LayoutError::Superseded)));

    let bb = service.bounding_box(id("cut")).await.expect("bounds").expect("non-empty");
    assert!((bb.width() - 1.0).abs() < 1e-6);
    assert!((bb.height() - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_cancelled_layout_keeps_best_so_far() {
    let service = GeometryWorker::spawn();
    let config = slow_layout_input(&service).await;

    let (events, mut rx) = mpsc::unbounded_channel();
    let cancel = CancelHandle::new();
    let search = tokio::spawn({
        let service = service.clone();
        let cancel = cancel.clone();
        async move {
            service
                .call(GeometryRequest::Layout {
                    target: id("cut"),
                    input: id("parts"),
                    config,
                    cancel,
                    events,
                })
                .await
        }
    });
    tokio::time::timeout(Duration::from_secs(10), first_placements(&mut rx))
        .await
        .expect("placements in time");
    cancel.cancel();

    let reply = tokio::time::timeout(Duration::from_secs(10), search)
        .await
        .expect("search stops after cancel")
        .expect("join")
        .expect("best so far");
    let GeometryReply::Layout(outcome) = reply else {
        panic!("expected a layout reply, got {:?}", reply);
    };
    assert_eq!(outcome.placed(), 6);
    assert!(service.bounding_box(id("cut")).await.expect("bounds").is_some());
}

#[tokio::test]
async fn test_improved_layout_is_stored_before_the_search_ends() {
    let service = GeometryWorker::spawn();
    let config = slow_layout_input(&service).await;

    let (events, mut rx) = mpsc::unbounded_channel();
    let cancel = CancelHandle::new();
    let search = tokio::spawn({
        let service = service.clone();
        let cancel = cancel.clone();
        async move {
            service
                .call(GeometryRequest::Layout {
                    target: id("cut"),
                    input: id("parts"),
                    config,
                    cancel,
                    events,
                })
                .await
        }
    });
    tokio::time::timeout(Duration::from_secs(10), first_placements(&mut rx))
        .await
        .expect("placements in time");

    // the search is still running, yet the target already holds its best layout
    assert!(!search.is_finished());
    assert!(service.bounding_box(id("cut")).await.expect("bounds").is_some());

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(10), search).await;
}
