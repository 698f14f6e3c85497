//! Boundary faces of a shape, in world coordinates.

use nalgebra::{Point3, Vector3};

/// Surface kind of a face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    /// Planar face; a cut-layout orientation candidate.
    Plane,
    /// Smooth wall approximated by facets; never a candidate.
    Curved,
}

/// A face bounded by an outer loop and optional inner loops
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub kind: FaceKind,
    pub outer: Vec<Point3<f64>>,
    pub holes: Vec<Vec<Point3<f64>>>,
    /// Outward unit normal
    pub normal: Vector3<f64>,
}

impl Face {
    pub fn is_planar(&self) -> bool {
        self.kind == FaceKind::Plane
    }

    /// Center of the outer loop's bounding box
    pub fn center(&self) -> Point3<f64> {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.outer {
            min = min.inf(p);
            max = max.sup(p);
        }
        nalgebra::center(&min, &max)
    }

    /// Area enclosed by the outer loop minus the inner loops
    pub fn area(&self) -> f64 {
        loop_area(&self.outer, &self.normal)
            - self.holes.iter().map(|h| loop_area(h, &self.normal)).sum::<f64>()
    }

    /// Inner loops visible from this face
    pub fn inner_count(&self) -> usize {
        self.holes.len()
    }
}

/// Newell's method, measured along `normal`.
fn loop_area(points: &[Point3<f64>], normal: &Vector3<f64>) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = Vector3::zeros();
    for i in 0..n {
        sum += points[i].coords.cross(&points[(i + 1) % n].coords);
    }
    (sum.dot(normal) / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_face_area_and_center() {
        let face = Face {
            kind: FaceKind::Plane,
            outer: vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(2.0, 0.0, 1.0),
                Point3::new(2.0, 2.0, 1.0),
                Point3::new(0.0, 2.0, 1.0),
            ],
            holes: Vec::new(),
            normal: Vector3::z(),
        };
        assert!((face.area() - 4.0).abs() < 1e-12);
        assert_eq!(face.center(), Point3::new(1.0, 1.0, 1.0));
    }
}
