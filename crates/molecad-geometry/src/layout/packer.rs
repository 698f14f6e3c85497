//! Genetic bin packing of part outlines onto rectangular sheets.
//!
//! An individual is an ordering of the parts plus a rotation index per part.
//! Individuals are decoded greedily: each part in turn goes to the first
//! bottom-left position on the first sheet where it fits, opening a new sheet
//! when none does. Outlines are padded by half the spacing and the sheet is
//! shrunk by the same amount, so placed parts keep the full spacing between
//! each other and from the sheet edge.

use cavalier_contours::polyline::{PlineSource, PlineSourceMut};
use molecad_core::LayoutError;
use nalgebra::{Point2, Vector2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::panic;
use std::time::Instant;
use tracing::{debug, warn};

use super::{CancelHandle, LayoutConfig, LayoutOutcome, Placement, Sheets, Translate};
use crate::kernel::polygon::{self, Bounds2};
use crate::kernel::Contour;

const UNPLACED_PENALTY: f64 = 1e9;

/// Progress reporting hooks for a search
pub trait PackObserver {
    /// Fraction of the time budget used, with the run's cancel handle
    fn progress(&mut self, fraction: f64, cancel: &CancelHandle);
    /// A new best layout was found
    fn improved(&mut self, sheets: &Sheets);
}

/// A part outline to pack; `id` is echoed back in placements
#[derive(Debug, Clone, PartialEq)]
pub struct PackItem {
    pub id: usize,
    pub outline: Vec<Point2<f64>>,
}

#[derive(Debug, Clone)]
struct Variant {
    rotate: f64,
    polygon: Vec<Point2<f64>>,
    bounds: Bounds2,
}

#[derive(Debug, Clone)]
struct PackPart {
    id: usize,
    area: f64,
    variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq)]
struct Genome {
    order: Vec<usize>,
    rotations: Vec<usize>,
}

#[derive(Debug, Clone)]
struct Placed {
    polygon: Vec<Point2<f64>>,
    bounds: Bounds2,
}

#[derive(Debug, Clone)]
struct Decoded {
    sheets: Sheets,
    unplaced: usize,
    fitness: f64,
}

/// Rotate a polygon about the origin
fn rotate(points: &[Point2<f64>], degrees: f64) -> Vec<Point2<f64>> {
    let (s, c) = degrees.to_radians().sin_cos();
    points
        .iter()
        .map(|p| Point2::new(p.x * c - p.y * s, p.x * s + p.y * c))
        .collect()
}

/// Grow a polygon outward by `distance`, sampling rounded corners.
pub fn inflate(points: &[Point2<f64>], distance: f64, curve_tolerance: f64) -> Vec<Point2<f64>> {
    let outline = Contour::new(points.to_vec(), false).with_winding(true);
    if distance <= 0.0 || outline.points.len() < 3 {
        return outline.points;
    }

    let mut pline = outline.to_polyline();
    pline.remove_repeat_pos(1e-5);

    let offsets = panic::catch_unwind(panic::AssertUnwindSafe(|| pline.parallel_offset(-distance)));
    let grown = match offsets {
        Ok(results) => results
            .iter()
            .map(|r| Contour::from_polyline(r, curve_tolerance))
            .max_by(|a, b| a.signed_area().abs().total_cmp(&b.signed_area().abs())),
        Err(_) => {
            warn!("Panic during parallel offset of part outline");
            None
        }
    };

    match grown {
        Some(contour) if contour.signed_area().abs() >= outline.signed_area().abs() => contour.points,
        _ => {
            // Offsetting failed; pad the bounding box instead.
            let b = Bounds2::of(&outline.points);
            vec![
                Point2::new(b.min.x - distance, b.min.y - distance),
                Point2::new(b.max.x + distance, b.min.y - distance),
                Point2::new(b.max.x + distance, b.max.y + distance),
                Point2::new(b.min.x - distance, b.max.y + distance),
            ]
        }
    }
}

/// Genetic nesting search over a fixed set of parts
pub struct Packer {
    parts: Vec<PackPart>,
    config: LayoutConfig,
    usable: Bounds2,
    rng: StdRng,
}

impl Packer {
    pub fn new(items: Vec<PackItem>, config: LayoutConfig) -> Result<Self, LayoutError> {
        if !(config.width > 0.0 && config.height > 0.0) {
            return Err(LayoutError::InvalidSheet {
                width: config.width,
                height: config.height,
            });
        }
        let half = config.spacing() / 2.0;
        let usable = Bounds2 {
            min: Point2::new(half, half),
            max: Point2::new(config.width - half, config.height - half),
        };

        let angles = config.rotation_angles();
        let parts = items
            .into_iter()
            .map(|item| {
                if item.outline.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                    return Err(LayoutError::NonFinitePoint);
                }
                let padded = inflate(&item.outline, half, config.curve_tolerance);
                let variants = angles
                    .iter()
                    .map(|&rotate| {
                        let polygon = self::rotate(&padded, rotate);
                        let bounds = Bounds2::of(&polygon);
                        Variant {
                            rotate,
                            polygon,
                            bounds,
                        }
                    })
                    .collect();
                Ok(PackPart {
                    id: item.id,
                    area: polygon::signed_area(&item.outline).abs(),
                    variants,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            parts,
            config,
            usable,
            rng,
        })
    }

    fn fits_empty_sheet(&self, variant: &Variant) -> bool {
        variant.bounds.width() <= self.usable.width() + 1e-9
            && variant.bounds.height() <= self.usable.height() + 1e-9
    }

    /// Bottom-left position for `variant` among `placed`, as an offset
    /// applied to the variant's polygon.
    fn find_position(&self, variant: &Variant, placed: &[Placed]) -> Option<Vector2<f64>> {
        let mut xs: Vec<f64> = std::iter::once(self.usable.min.x)
            .chain(placed.iter().map(|p| p.bounds.max.x))
            .collect();
        let mut ys: Vec<f64> = std::iter::once(self.usable.min.y)
            .chain(placed.iter().map(|p| p.bounds.max.y))
            .collect();
        xs.sort_by(f64::total_cmp);
        xs.dedup();
        ys.sort_by(f64::total_cmp);
        ys.dedup();

        for &y in &ys {
            for &x in &xs {
                let offset = Vector2::new(x - variant.bounds.min.x, y - variant.bounds.min.y);
                let bounds = variant.bounds.translated(offset);
                if bounds.max.x > self.usable.max.x + 1e-9 || bounds.max.y > self.usable.max.y + 1e-9 {
                    continue;
                }
                let mut moved: Option<Vec<Point2<f64>>> = None;
                let collides = placed.iter().any(|other| {
                    if !bounds.overlaps(&other.bounds) {
                        return false;
                    }
                    let poly = moved.get_or_insert_with(|| {
                        variant.polygon.iter().map(|p| p + offset).collect()
                    });
                    polygon::polygons_overlap(poly, &other.polygon)
                });
                if !collides {
                    return Some(offset);
                }
            }
        }
        None
    }

    fn decode(&self, genome: &Genome) -> Decoded {
        let mut sheets: Vec<Vec<Placed>> = Vec::new();
        let mut placements: Sheets = Vec::new();
        let mut unplaced = 0;

        for (&index, &rotation) in genome.order.iter().zip(&genome.rotations) {
            let part = &self.parts[index];
            let variant = &part.variants[rotation];
            if !self.fits_empty_sheet(variant) {
                unplaced += 1;
                continue;
            }

            let mut target = None;
            for (s, sheet) in sheets.iter().enumerate() {
                if let Some(offset) = self.find_position(variant, sheet) {
                    target = Some((s, offset));
                    break;
                }
            }
            let (s, offset) = match target {
                Some(found) => found,
                None => match self.find_position(variant, &[]) {
                    Some(offset) => {
                        sheets.push(Vec::new());
                        placements.push(Vec::new());
                        (sheets.len() - 1, offset)
                    }
                    None => {
                        unplaced += 1;
                        continue;
                    }
                },
            };

            sheets[s].push(Placed {
                polygon: variant.polygon.iter().map(|p| p + offset).collect(),
                bounds: variant.bounds.translated(offset),
            });
            placements[s].push(Placement {
                id: part.id,
                rotate: variant.rotate,
                translate: Translate {
                    x: offset.x,
                    y: offset.y,
                },
            });
        }

        let sheet_area = self.config.width * self.config.height;
        let last_used = sheets
            .last()
            .and_then(|sheet| sheet.iter().map(|p| p.bounds).reduce(|a, b| a.union(&b)))
            .map_or(0.0, |b| b.area());
        let fitness =
            unplaced as f64 * UNPLACED_PENALTY + sheets.len() as f64 * sheet_area + last_used;

        Decoded {
            sheets: placements,
            unplaced,
            fitness,
        }
    }

    fn mutate(&mut self, genome: &mut Genome) {
        let rate = f64::from(self.config.mutation_rate.min(100)) / 100.0;
        let n = genome.order.len();
        let rotations = self.config.rotations.max(1) as usize;
        for i in 0..n {
            if i + 1 < n && self.rng.gen_bool(rate) {
                genome.order.swap(i, i + 1);
                genome.rotations.swap(i, i + 1);
            }
            if rotations > 1 && self.rng.gen_bool(rate) {
                genome.rotations[i] = self.rng.gen_range(0..rotations);
            }
        }
    }

    /// Order-preserving single cut crossover
    fn crossover(&mut self, a: &Genome, b: &Genome) -> (Genome, Genome) {
        let n = a.order.len();
        let cut = if n > 1 { self.rng.gen_range(1..n) } else { n };
        let mate = |x: &Genome, y: &Genome| {
            let mut child = Genome {
                order: x.order[..cut].to_vec(),
                rotations: x.rotations[..cut].to_vec(),
            };
            for (o, r) in y.order.iter().zip(&y.rotations) {
                if !child.order.contains(o) {
                    child.order.push(*o);
                    child.rotations.push(*r);
                }
            }
            child
        };
        (mate(a, b), mate(b, a))
    }

    /// Parent selection biased toward the front of a sorted population
    fn pick<'a>(&mut self, ranked: &'a [(Genome, f64)]) -> &'a Genome {
        let n = ranked.len();
        let r: f64 = self.rng.gen();
        let index = ((r * r) * n as f64) as usize;
        &ranked[index.min(n - 1)].0
    }

    /// Run the search until the time budget, the generation cap, or `cancel`.
    pub fn run(
        &mut self,
        cancel: &CancelHandle,
        observer: &mut dyn PackObserver,
    ) -> Result<LayoutOutcome, LayoutError> {
        let part_count = self.parts.len();
        if part_count == 0 || !self.parts.iter().any(|p| p.variants.iter().any(|v| self.fits_empty_sheet(v))) {
            return Err(LayoutError::NothingPlaced);
        }

        let started = Instant::now();
        let runtime = self.config.runtime;
        let rotations = self.config.rotations.max(1) as usize;

        let mut order: Vec<usize> = (0..part_count).collect();
        order.sort_by(|&a, &b| self.parts[b].area.total_cmp(&self.parts[a].area));
        let seed = Genome {
            order,
            rotations: vec![0; part_count],
        };

        let mut population = vec![seed.clone()];
        if part_count == 1 {
            population.extend((1..rotations).map(|r| Genome {
                order: vec![0],
                rotations: vec![r],
            }));
        } else {
            while population.len() < self.config.population_size.max(2) {
                let mut g = seed.clone();
                self.mutate(&mut g);
                population.push(g);
            }
        }

        let mut best: Option<Decoded> = None;
        let mut generation = 0;

        'search: loop {
            let mut ranked: Vec<(Genome, f64)> = Vec::with_capacity(population.len());
            for genome in population.drain(..) {
                if cancel.is_cancelled() {
                    debug!("Layout search cancelled");
                    break 'search;
                }
                if best.is_some() && started.elapsed() >= runtime {
                    break 'search;
                }

                let decoded = self.decode(&genome);
                let fitness = decoded.fitness;
                let placed: usize = decoded.sheets.iter().map(Vec::len).sum();
                if placed > 0 && best.as_ref().is_none_or(|b| fitness < b.fitness) {
                    debug!(
                        "New best layout: {} of {} parts on {} sheet(s)",
                        placed,
                        part_count,
                        decoded.sheets.len()
                    );
                    observer.improved(&decoded.sheets);
                    best = Some(decoded);
                }
                ranked.push((genome, fitness));

                let elapsed = started.elapsed().as_secs_f64() / runtime.as_secs_f64().max(1e-9);
                observer.progress((0.1 + 0.9 * elapsed).min(1.0), cancel);
            }

            generation += 1;
            let exhausted = part_count == 1;
            let capped = self.config.max_generations.is_some_and(|max| generation >= max);
            if exhausted || capped || started.elapsed() >= runtime {
                break;
            }

            ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
            let size = self.config.population_size.max(2);
            population.push(ranked[0].0.clone());
            while population.len() < size {
                let a = self.pick(&ranked).clone();
                let b = self.pick(&ranked).clone();
                let (mut c1, mut c2) = self.crossover(&a, &b);
                self.mutate(&mut c1);
                population.push(c1);
                if population.len() < size {
                    self.mutate(&mut c2);
                    population.push(c2);
                }
            }
        }

        match best {
            Some(decoded) => Ok(LayoutOutcome {
                sheets: decoded.sheets,
                part_count,
                unplaced: decoded.unplaced,
            }),
            None if cancel.is_cancelled() => Err(LayoutError::Cancelled),
            None => Err(LayoutError::TimeLimit),
        }
    }
}
