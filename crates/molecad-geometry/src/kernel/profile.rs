//! Planar regions: an outer contour with optional holes.
//!
//! Outer contours wind counter-clockwise and holes clockwise. Booleans on
//! crossing contours go through `csgrs` sketches; offsets go through
//! `cavalier_contours` polylines.

use cavalier_contours::polyline::{PlineSourceMut, PlineVertex, Polyline};
use csgrs::sketch::Sketch;
use csgrs::traits::CSG;
use nalgebra::{Point2, Vector2};
use std::f64::consts::PI;

use super::polygon::{self, Bounds2};

/// Segments used to approximate a circle
pub const CIRCLE_SEGMENTS: usize = 48;

/// Closed loop of points. `curved` marks loops approximating a smooth curve,
/// whose side walls are not planar.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point2<f64>>,
    pub curved: bool,
}

impl Contour {
    pub fn new(points: Vec<Point2<f64>>, curved: bool) -> Self {
        Self { points, curved }
    }

    pub fn signed_area(&self) -> f64 {
        polygon::signed_area(&self.points)
    }

    pub fn bounds(&self) -> Bounds2 {
        Bounds2::of(&self.points)
    }

    pub fn contains(&self, p: &Point2<f64>) -> bool {
        polygon::contains_point(&self.points, p)
    }

    pub fn with_winding(mut self, counter_clockwise: bool) -> Self {
        if (self.signed_area() > 0.0) != counter_clockwise {
            self.points.reverse();
        }
        self
    }

    pub fn map(&self, f: impl Fn(&Point2<f64>) -> Point2<f64>) -> Self {
        Self {
            points: self.points.iter().map(f).collect(),
            curved: self.curved,
        }
    }

    /// Boundaries of the two contours meet anywhere.
    pub fn touches(&self, other: &Contour) -> bool {
        polygon::boundaries_touch(&self.points, &other.points)
    }

    /// `other` lies inside this contour, judged by its first vertex once the
    /// boundaries are known not to meet.
    fn encloses(&self, other: &Contour) -> bool {
        other.points.first().is_some_and(|p| self.contains(p))
    }

    pub fn to_polyline(&self) -> Polyline<f64> {
        let mut pline = Polyline::new();
        for p in &self.points {
            pline.add_vertex(PlineVertex::new(p.x, p.y, 0.0));
        }
        pline.set_is_closed(true);
        pline
    }

    /// Convert a closed polyline back to points, replacing arc segments by
    /// chords whose sagitta stays within `arc_tolerance`.
    pub fn from_polyline(pline: &Polyline<f64>, arc_tolerance: f64) -> Self {
        let vertices = &pline.vertex_data;
        let n = vertices.len();
        let mut points = Vec::with_capacity(n);
        let mut curved = false;
        for i in 0..n {
            let v = vertices[i];
            let next = vertices[(i + 1) % n];
            let start = Point2::new(v.x, v.y);
            points.push(start);
            if v.bulge.abs() > 1e-12 {
                curved = true;
                points.extend(arc_points(start, Point2::new(next.x, next.y), v.bulge, arc_tolerance));
            }
        }
        Self { points, curved }
    }

    fn to_sketch(&self) -> Sketch<()> {
        let points: Vec<[f64; 2]> = self.points.iter().map(|p| [p.x, p.y]).collect();
        Sketch::polygon(&points, None)
    }
}

/// Interior points of the arc from `start` to `end` with the given bulge.
fn arc_points(start: Point2<f64>, end: Point2<f64>, bulge: f64, tolerance: f64) -> Vec<Point2<f64>> {
    let chord = end - start;
    let chord_len = chord.norm();
    if chord_len < 1e-12 {
        return Vec::new();
    }
    let sweep = 4.0 * bulge.atan();
    let radius = chord_len / (2.0 * (sweep.abs() / 2.0).sin());
    let sagitta = bulge * chord_len / 2.0;
    let right = Vector2::new(chord.y, -chord.x) / chord_len;
    let mid = Point2::from((start.coords + end.coords) / 2.0);
    let center = mid - right * (radius - sagitta.abs()) * bulge.signum();

    let step_limit = if tolerance > 0.0 && tolerance < radius {
        2.0 * (1.0 - tolerance / radius).acos()
    } else {
        sweep.abs()
    };
    let segments = ((sweep.abs() / step_limit).ceil() as usize).max(2);
    let start_angle = (start.y - center.y).atan2(start.x - center.x);

    (1..segments)
        .map(|k| {
            let angle = start_angle + sweep * k as f64 / segments as f64;
            Point2::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

/// A region bounded by one outer contour, minus its holes
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub outer: Contour,
    pub holes: Vec<Contour>,
}

impl Profile {
    /// Build a profile, normalizing winding.
    pub fn new(outer: Contour, holes: Vec<Contour>) -> Self {
        Self {
            outer: outer.with_winding(true),
            holes: holes.into_iter().map(|h| h.with_winding(false)).collect(),
        }
    }

    /// Rectangle centered on the origin
    pub fn rectangle(width: f64, height: f64) -> Self {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Self::new(
            Contour::new(
                vec![
                    Point2::new(-hw, -hh),
                    Point2::new(hw, -hh),
                    Point2::new(hw, hh),
                    Point2::new(-hw, hh),
                ],
                false,
            ),
            Vec::new(),
        )
    }

    /// Circle centered on the origin
    pub fn circle(diameter: f64) -> Self {
        let r = diameter / 2.0;
        let points = (0..CIRCLE_SEGMENTS)
            .map(|i| {
                let a = 2.0 * PI * i as f64 / CIRCLE_SEGMENTS as f64;
                Point2::new(r * a.cos(), r * a.sin())
            })
            .collect();
        Self::new(Contour::new(points, true), Vec::new())
    }

    /// Regular polygon with vertices on a circle of `radius`
    pub fn regular_polygon(radius: f64, sides: usize) -> Self {
        let points = (0..sides)
            .map(|i| {
                let a = 2.0 * PI * i as f64 / sides as f64;
                Point2::new(radius * a.cos(), radius * a.sin())
            })
            .collect();
        Self::new(Contour::new(points, false), Vec::new())
    }

    pub fn area(&self) -> f64 {
        self.outer.signed_area().abs() - self.holes.iter().map(|h| h.signed_area().abs()).sum::<f64>()
    }

    pub fn bounds(&self) -> Bounds2 {
        self.outer.bounds()
    }

    pub fn contains(&self, p: &Point2<f64>) -> bool {
        self.outer.contains(p) && !self.holes.iter().any(|h| h.contains(p))
    }

    pub fn map(&self, f: impl Fn(&Point2<f64>) -> Point2<f64> + Copy) -> Self {
        Self::new(self.outer.map(f), self.holes.iter().map(|h| h.map(f)).collect())
    }

    /// Remove the area enclosed by `cutter` from this region.
    ///
    /// Cuts that miss the region, swallow it, or sit wholly inside it keep
    /// the existing contours untouched; anything else goes through a sketch
    /// boolean.
    pub fn subtract(&self, cutter: &Contour) -> Vec<Profile> {
        if !self.bounds().overlaps(&cutter.bounds()) {
            return vec![self.clone()];
        }

        let crossing = self.outer.touches(cutter) || self.holes.iter().any(|h| h.touches(cutter));
        if crossing {
            return self.subtract_crossing(cutter);
        }

        if cutter.encloses(&self.outer) {
            return Vec::new();
        }
        if !self.outer.encloses(cutter) || self.holes.iter().any(|h| h.encloses(cutter)) {
            return vec![self.clone()];
        }

        let mut holes: Vec<Contour> = self
            .holes
            .iter()
            .filter(|h| !cutter.encloses(h))
            .cloned()
            .collect();
        holes.push(cutter.clone());
        vec![Profile::new(self.outer.clone(), holes)]
    }

    fn to_sketch(&self) -> Sketch<()> {
        self.holes
            .iter()
            .fold(self.outer.to_sketch(), |sketch, hole| sketch.difference(&hole.to_sketch()))
    }

    fn subtract_crossing(&self, cutter: &Contour) -> Vec<Profile> {
        let curved = self.outer.curved || cutter.curved;
        let result = self.to_sketch().difference(&cutter.to_sketch());
        result
            .to_multipolygon()
            .0
            .iter()
            .filter_map(|poly| {
                let outer = ring_to_contour(poly.exterior().0.iter().map(|c| (c.x, c.y)), curved)?;
                let holes = poly
                    .interiors()
                    .iter()
                    .filter_map(|ring| ring_to_contour(ring.0.iter().map(|c| (c.x, c.y)), curved))
                    .collect();
                Some(Profile::new(outer, holes))
            })
            .collect()
    }
}

/// Closed ring from a sketch boolean; drops the repeated closing point and
/// collapsed rings.
fn ring_to_contour(coords: impl Iterator<Item = (f64, f64)>, curved: bool) -> Option<Contour> {
    let mut points: Vec<Point2<f64>> = Vec::new();
    for (x, y) in coords {
        let p = Point2::new(x, y);
        if points.last().is_some_and(|last| (p - last).norm() < 1e-9) {
            continue;
        }
        points.push(p);
    }
    if points.len() > 1 && (points[0] - points[points.len() - 1]).norm() < 1e-9 {
        points.pop();
    }
    let contour = Contour::new(points, curved);
    (contour.points.len() >= 3 && contour.signed_area().abs() > 1e-12).then_some(contour)
}
