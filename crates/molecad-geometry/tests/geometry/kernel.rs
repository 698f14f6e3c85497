use molecad_core::GeometryError;
use molecad_geometry::{GeometryNode, Profile, Shape};

fn rect(w: f64, h: f64) -> Shape {
    Shape::sketch(vec![Profile::rectangle(w, h)])
}

#[test]
fn test_extruded_rectangle_has_expected_extent() {
    let solid = rect(10.0, 5.0).extrude(3.0).expect("extrude");
    let bb = solid.bounding_box().expect("bounds");
    assert!((bb.width() - 10.0).abs() < 1e-3);
    assert!((bb.height() - 5.0).abs() < 1e-3);
    assert!((bb.depth() - 3.0).abs() < 1e-3);
}

#[test]
fn test_only_sketches_extrude() {
    let solid = rect(1.0, 1.0).extrude(1.0).expect("extrude");
    let err = solid.extrude(1.0).unwrap_err();
    assert_eq!(err.to_string(), "Only sketches can be extruded");
}

#[test]
fn test_rotated_box_swaps_extent() {
    let solid = rect(10.0, 2.0).extrude(1.0).expect("extrude");
    let turned = solid.rotated(0.0, 0.0, 90.0);
    let bb = turned.bounding_box().expect("bounds");
    assert!((bb.width() - 2.0).abs() < 1e-9);
    assert!((bb.height() - 10.0).abs() < 1e-9);
}

#[test]
fn test_sketch_notch_reduces_area() {
    let plate = rect(10.0, 10.0);
    let notch = rect(4.0, 4.0).translated(5.0, 0.0, 0.0);
    let cut = plate.difference(&notch).expect("difference");
    let area: f64 = cut.regions.iter().map(Profile::area).sum();
    assert!((area - 92.0).abs() < 1e-6);
}

#[test]
fn test_through_cut_on_translated_solids() {
    let plate = rect(20.0, 20.0).extrude(2.0).expect("extrude");
    let drill = Shape::sketch(vec![Profile::circle(4.0)])
        .extrude(10.0)
        .expect("extrude")
        .translated(3.0, 3.0, -5.0);
    let cut = plate.difference(&drill).expect("difference");
    assert_eq!(cut.regions.len(), 1);
    assert_eq!(cut.regions[0].holes.len(), 1);
}

#[test]
fn test_blind_pocket_is_rejected() {
    let plate = rect(20.0, 20.0).extrude(4.0).expect("extrude");
    let pocket = rect(5.0, 5.0).extrude(2.0).expect("extrude").translated(0.0, 0.0, 3.0);
    assert!(matches!(
        plate.difference(&pocket),
        Err(GeometryError::Boolean { .. })
    ));
}

#[test]
fn test_assembly_cuts_earlier_members() {
    let big: GeometryNode = rect(10.0, 10.0).into();
    let small: GeometryNode = rect(2.0, 2.0).into();
    let asm = GeometryNode::assembly(&[big, small]).expect("assembly");
    let leaves = asm.leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(leaves[0].shape.regions[0].holes.len(), 1);
    assert!(leaves[1].shape.regions[0].holes.is_empty());
}
