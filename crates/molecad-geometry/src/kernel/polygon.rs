//! Planar polygon predicates.
//!
//! Shared by the boolean code in the kernel and by the packer's collision
//! tests. Polygons are implicit-closed point lists (last point is not
//! repeated).

use nalgebra::{Point2, Vector2};

const EPSILON: f64 = 1e-9;

/// Axis-aligned 2D bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2 {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Bounds2 {
    pub fn of(points: &[Point2<f64>]) -> Self {
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn union(&self, other: &Bounds2) -> Bounds2 {
        Bounds2 {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn translated(&self, offset: Vector2<f64>) -> Bounds2 {
        Bounds2 {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// True when the interiors overlap; touching edges do not count.
    pub fn overlaps(&self, other: &Bounds2) -> bool {
        self.min.x < other.max.x - EPSILON
            && other.min.x < self.max.x - EPSILON
            && self.min.y < other.max.y - EPSILON
            && other.min.y < self.max.y - EPSILON
    }
}

/// Shoelace area; positive for counter-clockwise winding.
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// Iterate the closed edge loop of a polygon.
pub fn edges(points: &[Point2<f64>]) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
    let n = points.len();
    (0..n).map(move |i| (points[i], points[(i + 1) % n]))
}

/// Even-odd ray cast. Points exactly on the boundary may go either way.
pub fn contains_point(points: &[Point2<f64>], p: &Point2<f64>) -> bool {
    let mut inside = false;
    for (a, b) in edges(points) {
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Segments cross at a single interior point of both.
pub fn segments_cross(a1: &Point2<f64>, a2: &Point2<f64>, b1: &Point2<f64>, b2: &Point2<f64>) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);
    ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
}

fn on_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> bool {
    cross(a, b, p).abs() <= EPSILON * (1.0 + (b - a).norm())
        && p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// Segments share at least one point, touching included.
pub fn segments_touch(a1: &Point2<f64>, a2: &Point2<f64>, b1: &Point2<f64>, b2: &Point2<f64>) -> bool {
    segments_cross(a1, a2, b1, b2)
        || on_segment(a1, b1, b2)
        || on_segment(a2, b1, b2)
        || on_segment(b1, a1, a2)
        || on_segment(b2, a1, a2)
}

/// Any pair of boundary edges share a point.
pub fn boundaries_touch(a: &[Point2<f64>], b: &[Point2<f64>]) -> bool {
    edges(a).any(|(a1, a2)| edges(b).any(|(b1, b2)| segments_touch(&a1, &a2, &b1, &b2)))
}

/// Interiors of two simple polygons overlap. Shared edges and touching
/// vertices are not an overlap.
pub fn polygons_overlap(a: &[Point2<f64>], b: &[Point2<f64>]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    if !Bounds2::of(a).overlaps(&Bounds2::of(b)) {
        return false;
    }
    let crossing = edges(a).any(|(a1, a2)| {
        edges(b).any(|(b1, b2)| segments_cross(&a1, &a2, &b1, &b2))
    });
    if crossing {
        return true;
    }
    // No proper crossings: one contains the other, or they are apart.
    // Probe with edge midpoints nudged into the polygon's own interior so
    // shared boundaries never decide the answer.
    probe_interior(a, b) || probe_interior(b, a)
}

fn probe_interior(inner: &[Point2<f64>], outer: &[Point2<f64>]) -> bool {
    let winding = signed_area(inner).signum();
    edges(inner).any(|(p, q)| {
        let d = q - p;
        let len = d.norm();
        if len < EPSILON {
            return false;
        }
        let inward = Vector2::new(-d.y, d.x) / len * winding;
        let nudge = (len * 1e-3).min(1e-4);
        let probe = Point2::from((p.coords + q.coords) / 2.0) + inward * nudge;
        contains_point(outer, &probe)
    })
}
