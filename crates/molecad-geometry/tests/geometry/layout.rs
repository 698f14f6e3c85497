use molecad_core::{LayoutError, Units};
use molecad_geometry::layout::packer::PackObserver;
use molecad_geometry::layout::{self, unplaced_warning};
use molecad_geometry::{CancelHandle, GeometryNode, LayoutConfig, Profile, Shape, Sheets};
use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    progress: Vec<f64>,
    improvements: usize,
}

impl PackObserver for Recorder {
    fn progress(&mut self, fraction: f64, _cancel: &CancelHandle) {
        self.progress.push(fraction);
    }

    fn improved(&mut self, _sheets: &Sheets) {
        self.improvements += 1;
    }
}

fn config(width: f64, height: f64, padding: f64) -> LayoutConfig {
    LayoutConfig {
        width,
        height,
        part_padding: padding,
        units: Units::Millimeters,
        runtime: Duration::from_millis(500),
        rotations: 4,
        max_generations: Some(4),
        seed: Some(11),
        ..Default::default()
    }
}

fn rect(w: f64, h: f64) -> GeometryNode {
    Shape::sketch(vec![Profile::rectangle(w, h)]).into()
}

/// Rectangles side by side along X, far enough apart not to cut each other
fn spaced(parts: &[(f64, f64)]) -> GeometryNode {
    let mut cursor = 0.0;
    let nodes: Vec<GeometryNode> = parts
        .iter()
        .map(|&(w, h)| {
            let x = cursor + w / 2.0;
            cursor += w + 10.0;
            rect(w, h)
                .act_on_leaves(&|p| Ok(p.with_shape(p.shape.translated(x, 0.0, 0.0))))
                .expect("translate")
        })
        .collect();
    GeometryNode::assembly(&nodes).expect("assembly")
}

#[test]
fn test_two_tagged_rectangles_fit_on_one_sheet() {
    let asm = spaced(&[(10.0, 5.0), (8.0, 4.0)]).tagged(&["cut".to_string()]);
    let config = config(100.0, 100.0, 2.0);
    let prepared = layout::prepare(&asm, &config).expect("prepare");
    let mut recorder = Recorder::default();
    let outcome = layout::compute_positions(&prepared, &config, &CancelHandle::new(), &mut recorder)
        .expect("layout");

    assert!(!outcome.sheets.is_empty());
    assert!(!outcome.sheets[0].is_empty());
    assert_eq!(outcome.unplaced, 0);
    assert!(recorder.improvements >= 1);
    assert!(recorder.progress.iter().all(|f| (0.1..=1.0).contains(f)));
}

#[test]
fn test_sheet_too_small_fails() {
    let asm = spaced(&[(50.0, 50.0), (60.0, 60.0)]);
    let config = config(20.0, 20.0, 1.0);
    let prepared = layout::prepare(&asm, &config).expect("prepare");
    let err = layout::compute_positions(&prepared, &config, &CancelHandle::new(), &mut Recorder::default())
        .unwrap_err();
    assert_eq!(err, LayoutError::NothingPlaced);
}

#[test]
fn test_partial_layout_reports_unplaced() {
    let asm = spaced(&[(10.0, 10.0), (300.0, 300.0)]);
    let config = config(100.0, 100.0, 2.0);
    let prepared = layout::prepare(&asm, &config).expect("prepare");
    let outcome = layout::compute_positions(&prepared, &config, &CancelHandle::new(), &mut Recorder::default())
        .expect("partial layout");
    assert_eq!(outcome.placed(), 1);
    assert_eq!(outcome.unplaced, 1);
    assert_eq!(
        unplaced_warning(outcome.unplaced),
        "1 parts are too big to fit on this sheet size. Failed layout for 1 part(s)"
    );
}

#[test]
fn test_part_without_faces_is_uncuttable() {
    let config = config(100.0, 100.0, 2.0);
    let empty: GeometryNode = Shape::sketch(Vec::new()).into();
    assert!(matches!(
        layout::prepare(&empty, &config),
        Err(LayoutError::NoFlatFace)
    ));
}

#[test]
fn test_boards_are_laid_flat() {
    let board: GeometryNode = Shape::sketch(vec![Profile::rectangle(40.0, 12.0)])
        .extrude(30.0)
        .expect("extrude")
        .into();
    let config = config(200.0, 200.0, 2.0);
    let prepared = layout::prepare(&board, &config).expect("prepare");
    assert_eq!(prepared.parts.len(), 1);
    assert!((prepared.parts[0].thickness - 12.0).abs() < 1e-9);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_placements_reference_each_part_once(
        sizes in prop::collection::vec((2.0f64..40.0, 2.0f64..40.0), 1..5)
    ) {
        let asm = spaced(&sizes);
        let mut config = config(60.0, 60.0, 1.0);
        config.max_generations = Some(2);
        let prepared = layout::prepare(&asm, &config).expect("prepare");
        let outcome = layout::compute_positions(
            &prepared,
            &config,
            &CancelHandle::new(),
            &mut Recorder::default(),
        )
        .expect("every size fits an empty sheet");

        let ids: Vec<usize> = outcome.sheets.iter().flatten().map(|p| p.id).collect();
        let unique: HashSet<usize> = ids.iter().copied().collect();
        prop_assert!(ids.len() <= sizes.len());
        prop_assert_eq!(unique.len(), ids.len());
        prop_assert!(ids.iter().all(|id| *id < sizes.len()));
        prop_assert_eq!(outcome.placed() + outcome.unplaced, sizes.len());
    }
}
