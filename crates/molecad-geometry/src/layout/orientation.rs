//! Choosing the face each part is cut from.
//!
//! Every planar face is a candidate underside. A candidate is dropped when
//! the part would poke below the cutting plane once that face is laid on
//! it. The surviving candidates are ranked against a common material
//! thickness inferred from all parts.

use molecad_core::LayoutError;
use nalgebra::{Isometry3, Point2, Point3, Translation3, UnitQuaternion, Vector3};
use std::cmp::Ordering;

use super::LayoutConfig;
use crate::kernel::Face;
use crate::model::{GeometryNode, Part};

const THICKNESS_TOLERANCE: f64 = 0.001;

/// A part lying on its chosen face, face center at the origin
#[derive(Debug, Clone, PartialEq)]
pub struct FlatPart {
    /// Position of the part in leaf order
    pub id: usize,
    pub part: Part,
    /// Outer loop of the chosen face, in the cutting plane
    pub outline: Vec<Point2<f64>>,
    pub thickness: f64,
}

#[derive(Debug, Clone)]
struct Candidate {
    transform: Isometry3<f64>,
    face: Face,
    thickness: f64,
    area: f64,
    inner: usize,
}

fn equal_thickness(a: f64, b: f64) -> bool {
    (a - b).abs() < THICKNESS_TOLERANCE
}

/// Rigid motion laying `face` on the XY plane, outward normal pointing
/// down and face center at the origin.
pub fn move_face_to_cutting_plane(face: &Face) -> Isometry3<f64> {
    let down = -Vector3::z();
    let rotation = UnitQuaternion::rotation_between(&face.normal, &down)
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI));
    let center = rotation * face.center();
    Translation3::new(-center.x, -center.y, -center.z) * rotation
}

fn candidates_for(part: &Part, tolerance: f64) -> Result<Vec<Candidate>, LayoutError> {
    let faces = part.shape.faces();
    if !faces.iter().any(Face::is_planar) {
        return Err(LayoutError::NoFlatFace);
    }

    let vertices = part.shape.vertices();
    let candidates: Vec<Candidate> = faces
        .into_iter()
        .filter(Face::is_planar)
        .filter_map(|face| {
            let transform = move_face_to_cutting_plane(&face);
            let (lo, hi) = vertices
                .iter()
                .map(|v| (transform * v).z)
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), z| (lo.min(z), hi.max(z)));
            if lo < -tolerance {
                return None;
            }
            Some(Candidate {
                transform,
                thickness: hi - lo,
                area: face.area(),
                inner: face.inner_count(),
                face,
            })
        })
        .collect();

    if candidates.is_empty() {
        return Err(LayoutError::NoFlatFace);
    }
    Ok(candidates)
}

/// Ordering of candidates, best first.
fn rank(a: &Candidate, b: &Candidate, material: Option<f64>) -> Ordering {
    if !equal_thickness(a.thickness, b.thickness) {
        if let Some(material) = material {
            if equal_thickness(a.thickness, material) {
                return Ordering::Less;
            }
            if equal_thickness(b.thickness, material) {
                return Ordering::Greater;
            }
        }
        return a.thickness.total_cmp(&b.thickness);
    }
    if a.inner != b.inner {
        return a.inner.cmp(&b.inner);
    }
    if (a.area - b.area).abs() > THICKNESS_TOLERANCE {
        return b.area.total_cmp(&a.area);
    }
    Ordering::Equal
}

/// Stock thickness shared by the parts, if it is plausible for sheet stock.
fn infer_material_thickness(all: &[Vec<Candidate>], ceiling: f64) -> Option<f64> {
    let largest_min = all
        .iter()
        .map(|c| c.iter().map(|c| c.thickness).fold(f64::INFINITY, f64::min))
        .fold(f64::NEG_INFINITY, f64::max);
    (largest_min.is_finite() && largest_min <= ceiling + THICKNESS_TOLERANCE).then_some(largest_min)
}

/// Lay every part of `node` on its best face.
pub fn rotate_for_layout(node: &GeometryNode, config: &LayoutConfig) -> Result<Vec<FlatPart>, LayoutError> {
    let leaves = node.leaves();
    let all = leaves
        .iter()
        .map(|part| candidates_for(part, THICKNESS_TOLERANCE))
        .collect::<Result<Vec<_>, _>>()?;

    let material = infer_material_thickness(&all, config.units.plausible_stock_ceiling());
    match material {
        Some(t) => tracing::debug!("Inferred material thickness {:.3}", t),
        None => tracing::debug!("No common material thickness; preferring thinnest faces"),
    }

    Ok(leaves
        .into_iter()
        .zip(all)
        .enumerate()
        .filter_map(|(id, (part, candidates))| {
            let best = candidates
                .into_iter()
                .min_by(|a, b| rank(a, b, material))?;
            let outline = best
                .face
                .outer
                .iter()
                .map(|p| {
                    let q: Point3<f64> = best.transform * p;
                    Point2::new(q.x, q.y)
                })
                .collect();
            Some(FlatPart {
                id,
                part: part.with_shape(part.shape.transformed(&best.transform)),
                outline,
                thickness: best.thickness,
            })
        })
        .collect())
}
