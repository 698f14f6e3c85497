//! Sketches and prismatic solids.
//!
//! A shape keeps its profiles in a local frame (the sketch plane is local
//! z = 0, prisms rise along local +Z) plus a rigid placement into world
//! space. Transforms only touch the placement; booleans work on the
//! profiles after mapping the cutter into the local frame.

use molecad_core::GeometryError;
use nalgebra::{Isometry3, Point2, Point3, Translation3, UnitQuaternion, Vector3};

use super::face::{Face, FaceKind};
use super::profile::{Contour, Profile};

const AXIS_EPSILON: f64 = 1e-9;
const DEPTH_EPSILON: f64 = 1e-6;

/// Dimensionality of a shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    /// Flat regions in the local z = 0 plane
    Sketch,
    /// Regions swept from local z = 0 to z = `height`
    Prism { height: f64 },
}

/// Axis-aligned world bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    pub fn of<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self { min: first, max: first }, |b, p| Self {
            min: b.min.inf(p),
            max: b.max.sup(p),
        }))
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Extent along X
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Extent along Y
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Extent along Z
    pub fn depth(&self) -> f64 {
        self.max.z - self.min.z
    }

    fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }
}

/// A sketch or prism with its world placement
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub regions: Vec<Profile>,
    pub kind: ShapeKind,
    pub placement: Isometry3<f64>,
}

impl Shape {
    /// Sketch in the world XY plane
    pub fn sketch(regions: Vec<Profile>) -> Self {
        Self {
            regions,
            kind: ShapeKind::Sketch,
            placement: Isometry3::identity(),
        }
    }

    pub fn is_solid(&self) -> bool {
        matches!(self.kind, ShapeKind::Prism { .. })
    }

    /// Sweep a sketch along its normal. Negative heights sweep backwards.
    pub fn extrude(&self, height: f64) -> Result<Shape, GeometryError> {
        if self.is_solid() {
            return Err(GeometryError::IncompatibleInputs {
                reason: "Only sketches can be extruded".to_string(),
            });
        }
        if !height.is_finite() || height.abs() < DEPTH_EPSILON {
            return Err(GeometryError::InvalidDimension {
                operation: "extrude".to_string(),
                parameter: "height".to_string(),
                value: height,
            });
        }
        let placement = if height < 0.0 {
            self.placement * Translation3::new(0.0, 0.0, height)
        } else {
            self.placement
        };
        Ok(Shape {
            regions: self.regions.clone(),
            kind: ShapeKind::Prism {
                height: height.abs(),
            },
            placement,
        })
    }

    pub fn translated(&self, x: f64, y: f64, z: f64) -> Shape {
        self.transformed(&Isometry3::translation(x, y, z))
    }

    /// Rotate about the world origin: X first, then Y, then Z (degrees).
    pub fn rotated(&self, x_deg: f64, y_deg: f64, z_deg: f64) -> Shape {
        let rotation =
            UnitQuaternion::from_euler_angles(x_deg.to_radians(), y_deg.to_radians(), z_deg.to_radians());
        self.transformed(&Isometry3::from_parts(Translation3::identity(), rotation))
    }

    pub fn transformed(&self, iso: &Isometry3<f64>) -> Shape {
        Shape {
            regions: self.regions.clone(),
            kind: self.kind,
            placement: iso * self.placement,
        }
    }

    fn height(&self) -> f64 {
        match self.kind {
            ShapeKind::Sketch => 0.0,
            ShapeKind::Prism { height } => height,
        }
    }

    fn to_world(&self, p: &Point2<f64>, z: f64) -> Point3<f64> {
        self.placement * Point3::new(p.x, p.y, z)
    }

    fn contours(&self) -> impl Iterator<Item = &Contour> {
        self.regions
            .iter()
            .flat_map(|r| std::iter::once(&r.outer).chain(r.holes.iter()))
    }

    /// All outline vertices in world space
    pub fn vertices(&self) -> Vec<Point3<f64>> {
        let levels = match self.kind {
            ShapeKind::Sketch => vec![0.0],
            ShapeKind::Prism { height } => vec![0.0, height],
        };
        let mut out = Vec::new();
        for contour in self.contours() {
            for z in &levels {
                out.extend(contour.points.iter().map(|p| self.to_world(p, *z)));
            }
        }
        out
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::of(&self.vertices())
    }

    /// Boundary faces in world space
    pub fn faces(&self) -> Vec<Face> {
        let rotation = self.placement.rotation;
        let h = self.height();
        let mut faces = Vec::new();

        for region in &self.regions {
            let cap = |z: f64, normal: Vector3<f64>| Face {
                kind: FaceKind::Plane,
                outer: region.outer.points.iter().map(|p| self.to_world(p, z)).collect(),
                holes: region
                    .holes
                    .iter()
                    .map(|hole| hole.points.iter().map(|p| self.to_world(p, z)).collect())
                    .collect(),
                normal: rotation * normal,
            };

            faces.push(cap(0.0, -Vector3::z()));
            if !self.is_solid() {
                continue;
            }
            faces.push(cap(h, Vector3::z()));

            for contour in std::iter::once(&region.outer).chain(region.holes.iter()) {
                if contour.curved {
                    faces.push(Face {
                        kind: FaceKind::Curved,
                        outer: contour.points.iter().map(|p| self.to_world(p, 0.0)).collect(),
                        holes: Vec::new(),
                        normal: Vector3::zeros(),
                    });
                    continue;
                }
                let n = contour.points.len();
                for i in 0..n {
                    let a = contour.points[i];
                    let b = contour.points[(i + 1) % n];
                    let d = b - a;
                    let len = d.norm();
                    if len < AXIS_EPSILON {
                        continue;
                    }
                    let outward = Vector3::new(d.y / len, -d.x / len, 0.0);
                    faces.push(Face {
                        kind: FaceKind::Plane,
                        outer: vec![
                            self.to_world(&a, 0.0),
                            self.to_world(&b, 0.0),
                            self.to_world(&b, h),
                            self.to_world(&a, h),
                        ],
                        holes: Vec::new(),
                        normal: rotation * outward,
                    });
                }
            }
        }
        faces
    }

    /// Remove `cutter` from this shape.
    ///
    /// Sketches subtract in the sketch plane. Prisms accept cutters whose
    /// axis is parallel and whose depth spans the whole prism; cutters that
    /// miss the prism leave it unchanged.
    pub fn difference(&self, cutter: &Shape) -> Result<Shape, GeometryError> {
        if self.is_solid() != cutter.is_solid() {
            return Err(GeometryError::IncompatibleInputs {
                reason: "Both inputs must be either 3D or 2D".to_string(),
            });
        }

        let to_local = self.placement.inverse() * cutter.placement;
        if self.is_solid() {
            let (Some(own), Some(other)) = (self.bounding_box(), cutter.bounding_box()) else {
                return Ok(self.clone());
            };
            if !own.overlaps(&other) {
                return Ok(self.clone());
            }
            let axis = to_local.rotation * Vector3::z();
            if (axis.z.abs() - 1.0).abs() > AXIS_EPSILON {
                return Err(GeometryError::Boolean {
                    reason: "cutting solid must share the target's extrusion axis".to_string(),
                });
            }
            let z_range = cutter
                .vertices()
                .iter()
                .map(|p| (self.placement.inverse() * p).z)
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), z| (lo.min(z), hi.max(z)));
            let h = self.height();
            if z_range.1 <= DEPTH_EPSILON || z_range.0 >= h - DEPTH_EPSILON {
                return Ok(self.clone());
            }
            if z_range.0 > DEPTH_EPSILON || z_range.1 < h - DEPTH_EPSILON {
                return Err(GeometryError::Boolean {
                    reason: "cutting solid must pass all the way through the target".to_string(),
                });
            }
        }

        let project = |p: &Point2<f64>| {
            let q = to_local * Point3::new(p.x, p.y, 0.0);
            Point2::new(q.x, q.y)
        };
        let mut regions = self.regions.clone();
        for cut in &cutter.regions {
            let outline = cut.outer.map(project);
            regions = regions.iter().flat_map(|r| r.subtract(&outline)).collect();
        }

        Ok(Shape {
            regions,
            kind: self.kind,
            placement: self.placement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extruded_rectangle_bounds() {
        let solid = Shape::sketch(vec![Profile::rectangle(10.0, 5.0)])
            .extrude(3.0)
            .expect("extrude");
        let bb = solid.bounding_box().expect("bounds");
        assert!((bb.width() - 10.0).abs() < 1e-3);
        assert!((bb.height() - 5.0).abs() < 1e-3);
        assert!((bb.depth() - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_negative_extrude_goes_down() {
        let solid = Shape::sketch(vec![Profile::rectangle(2.0, 2.0)])
            .extrude(-4.0)
            .expect("extrude");
        let bb = solid.bounding_box().expect("bounds");
        assert!((bb.min.z + 4.0).abs() < 1e-9);
        assert!(bb.max.z.abs() < 1e-9);
    }

    #[test]
    fn test_zero_extrude_rejected() {
        let sketch = Shape::sketch(vec![Profile::rectangle(2.0, 2.0)]);
        assert!(matches!(
            sketch.extrude(0.0),
            Err(GeometryError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn test_box_faces() {
        let solid = Shape::sketch(vec![Profile::rectangle(4.0, 2.0)])
            .extrude(1.0)
            .expect("extrude");
        let faces = solid.faces();
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(Face::is_planar));
        let bottom = &faces[0];
        assert!((bottom.normal + Vector3::z()).norm() < 1e-12);
        assert!((bottom.area() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_cylinder_wall_is_curved() {
        let cylinder = Shape::sketch(vec![Profile::circle(10.0)])
            .extrude(5.0)
            .expect("extrude");
        let faces = cylinder.faces();
        assert_eq!(faces.len(), 3);
        assert_eq!(faces.iter().filter(|f| f.is_planar()).count(), 2);
    }

    #[test]
    fn test_rotation_about_x_swaps_height_and_depth() {
        let solid = Shape::sketch(vec![Profile::rectangle(10.0, 5.0)])
            .extrude(3.0)
            .expect("extrude")
            .rotated(90.0, 0.0, 0.0);
        let bb = solid.bounding_box().expect("bounds");
        assert!((bb.height() - 3.0).abs() < 1e-9);
        assert!((bb.depth() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_through_hole_difference() {
        let plate = Shape::sketch(vec![Profile::rectangle(20.0, 20.0)])
            .extrude(2.0)
            .expect("extrude");
        let drill = Shape::sketch(vec![Profile::circle(4.0)])
            .extrude(10.0)
            .expect("extrude")
            .translated(0.0, 0.0, -5.0);
        let result = plate.difference(&drill).expect("difference");
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].holes.len(), 1);
    }

    #[test]
    fn test_mixed_difference_rejected() {
        let sketch = Shape::sketch(vec![Profile::rectangle(2.0, 2.0)]);
        let solid = sketch.extrude(1.0).expect("extrude");
        let err = solid.difference(&sketch).unwrap_err();
        assert_eq!(err.to_string(), "Both inputs must be either 3D or 2D");
    }
}
