//! Display meshes: per-part wireframes handed to a renderer.

use nalgebra::Point3;

use crate::model::GeometryNode;

/// Edges of one part, in world coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMesh {
    pub color: String,
    pub edges: Vec<[Point3<f64>; 2]>,
}

/// One wireframe per leaf of `node`. Edges shared by adjacent faces are
/// listed once per face.
pub fn display_meshes(node: &GeometryNode) -> Vec<DisplayMesh> {
    node.leaves()
        .into_iter()
        .map(|part| {
            let mut edges = Vec::new();
            for face in part.shape.faces() {
                for ring in std::iter::once(&face.outer).chain(face.holes.iter()) {
                    let n = ring.len();
                    edges.extend((0..n).map(|i| [ring[i], ring[(i + 1) % n]]));
                }
            }
            DisplayMesh {
                color: part.color.clone(),
                edges,
            }
        })
        .collect()
}
