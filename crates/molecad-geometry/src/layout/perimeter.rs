//! Rebuilding a closed outline from loose edge segments.
//!
//! Face boundaries arrive as a set of edges, each a short polyline, in no
//! particular order or direction. The packer needs one polygon wound around
//! the perimeter, so the edges are chained end to start.

use molecad_core::LayoutError;
use nalgebra::Point2;

/// One boundary edge, sampled as a polyline
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeGroup {
    pub id: usize,
    pub points: Vec<Point2<f64>>,
}

/// Split a closed loop into one edge group per segment.
pub fn edge_groups(outline: &[Point2<f64>]) -> Vec<EdgeGroup> {
    let n = outline.len();
    (0..n)
        .map(|i| EdgeGroup {
            id: i,
            points: vec![outline[i], outline[(i + 1) % n]],
        })
        .collect()
}

struct EdgeEnd<'a> {
    group: &'a EdgeGroup,
    reversed: bool,
}

impl EdgeEnd<'_> {
    fn start(&self) -> Point2<f64> {
        if self.reversed {
            self.group.points[self.group.points.len() - 1]
        } else {
            self.group.points[0]
        }
    }

    /// Points after the start, in walking order
    fn tail(&self) -> Vec<Point2<f64>> {
        let mut pts: Vec<Point2<f64>> = self.group.points.clone();
        if self.reversed {
            pts.reverse();
        }
        pts.into_iter().skip(1).collect()
    }
}

fn almost_equal(a: &Point2<f64>, b: &Point2<f64>, tolerance: f64) -> bool {
    (a.x - b.x).abs() < tolerance && (a.y - b.y).abs() < tolerance
}

/// Chain edge groups into a single perimeter.
///
/// Fails when the walk reaches an endpoint that does not continue into
/// exactly one remaining edge: the outline is open or branches.
pub fn prepare_points(groups: &[EdgeGroup], tolerance: f64) -> Result<Vec<Point2<f64>>, LayoutError> {
    let mut ends: Vec<EdgeEnd> = groups
        .iter()
        .filter(|g| !g.points.is_empty())
        .flat_map(|group| {
            [
                EdgeEnd {
                    group,
                    reversed: false,
                },
                EdgeEnd {
                    group,
                    reversed: true,
                },
            ]
        })
        .collect();

    let mut result: Vec<Point2<f64>> = Vec::new();
    let Some(first) = ends.first() else {
        return Ok(result);
    };
    let mut current_id = first.group.id;
    let mut current_tail = first.tail();

    loop {
        result.extend(current_tail);
        ends.retain(|e| e.group.id != current_id);
        if ends.is_empty() {
            break;
        }

        let Some(last) = result.last().copied() else {
            return Err(LayoutError::PerimeterChain { continuations: 0 });
        };
        let mut next: Vec<&EdgeEnd> = ends
            .iter()
            .filter(|e| almost_equal(&last, &e.start(), tolerance))
            .collect();
        // A segment shorter than the tolerance matches in both directions;
        // keep the direction whose start is closest.
        next.sort_by(|a, b| {
            a.group
                .id
                .cmp(&b.group.id)
                .then((a.start() - last).norm().total_cmp(&(b.start() - last).norm()))
        });
        next.dedup_by_key(|e| e.group.id);

        if next.len() != 1 {
            return Err(LayoutError::PerimeterChain {
                continuations: next.len(),
            });
        }
        current_id = next[0].group.id;
        current_tail = next[0].tail();
    }

    if result.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(LayoutError::NonFinitePoint);
    }
    Ok(result)
}
