//! Cut layout: flatten parts onto their best face and nest them on sheets.
//!
//! The pipeline runs in three stages:
//! 1. [`orientation`] picks a flat face per part and lays the part on it.
//! 2. [`perimeter`] rebuilds each face outline as a closed polygon.
//! 3. [`packer`] searches for placements; [`apply`] moves the parts there.

pub mod apply;
pub mod orientation;
pub mod packer;
pub mod perimeter;

use molecad_core::{LayoutError, Units};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::model::GeometryNode;
use orientation::FlatPart;
use packer::{PackItem, PackObserver, Packer};

/// Parameters of one layout run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub width: f64,
    pub height: f64,
    pub part_padding: f64,
    pub units: Units,
    /// Distance under which points and thicknesses are considered equal
    pub tolerance: f64,
    /// Wall-clock budget of the search
    #[serde(with = "duration_ms")]
    pub runtime: Duration,
    /// Number of allowed rotations, evenly spaced over a full turn
    pub rotations: u32,
    pub population_size: usize,
    /// Mutation probability in percent
    pub mutation_rate: u32,
    /// Maximum sagitta when arcs are replaced by chords
    pub curve_tolerance: f64,
    /// Stop after this many generations even if time remains
    #[serde(default)]
    pub max_generations: Option<usize>,
    /// Seed for a reproducible search
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 1219.0,
            height: 2438.0,
            part_padding: 6.0,
            units: Units::Millimeters,
            tolerance: 0.1,
            runtime: Duration::from_millis(30_000),
            rotations: 12,
            population_size: 8,
            mutation_rate: 50,
            curve_tolerance: 0.3,
            max_generations: None,
            seed: None,
        }
    }
}

impl LayoutConfig {
    /// Gap kept between parts and from the sheet edge
    pub fn spacing(&self) -> f64 {
        self.part_padding + 2.0 * self.tolerance
    }

    /// Candidate rotation angles in degrees
    pub fn rotation_angles(&self) -> Vec<f64> {
        let n = self.rotations.max(1);
        (0..n).map(|i| 360.0 * i as f64 / n as f64).collect()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Where one part goes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Index of the part in layout order
    pub id: usize,
    /// Rotation about the sheet normal, degrees
    pub rotate: f64,
    pub translate: Translate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Translate {
    pub x: f64,
    pub y: f64,
}

/// Placements grouped per sheet
pub type Sheets = Vec<Vec<Placement>>;

/// Shared flag that stops a running search
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Notifications emitted while a layout runs
#[derive(Debug, Clone)]
pub enum LayoutEvent {
    /// Fraction complete, with the handle that cancels this run
    Progress { fraction: f64, cancel: CancelHandle },
    /// Non-fatal problem, e.g. parts that could not be placed
    Warning(String),
    /// A better set of placements was found
    Placements(Sheets),
}

/// Final result of a layout run
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOutcome {
    pub sheets: Sheets,
    pub part_count: usize,
    pub unplaced: usize,
}

impl LayoutOutcome {
    pub fn placed(&self) -> usize {
        self.sheets.iter().map(Vec::len).sum()
    }
}

/// Warning text for parts that did not make it onto any sheet
pub fn unplaced_warning(unplaced: usize) -> String {
    format!(
        "{} parts are too big to fit on this sheet size. Failed layout for {} part(s)",
        unplaced, unplaced
    )
}

/// Parts flattened and outlined, ready for the packer
#[derive(Debug, Clone)]
pub struct PreparedLayout {
    pub parts: Vec<FlatPart>,
    pub items: Vec<PackItem>,
    /// Parts whose outline could not be closed, with the reason
    pub skipped: Vec<(usize, LayoutError)>,
}

/// Orient every part and rebuild its outline.
///
/// A part without a usable face fails the whole layout. A part whose
/// outline cannot be chained is skipped and later counted as unplaced.
pub fn prepare(node: &GeometryNode, config: &LayoutConfig) -> Result<PreparedLayout, LayoutError> {
    let parts = orientation::rotate_for_layout(node, config)?;
    let mut items = Vec::with_capacity(parts.len());
    let mut skipped = Vec::new();
    for flat in &parts {
        let groups = perimeter::edge_groups(&flat.outline);
        match perimeter::prepare_points(&groups, config.tolerance) {
            Ok(outline) => items.push(PackItem {
                id: flat.id,
                outline,
            }),
            Err(err) => {
                tracing::warn!("Skipping part {} in layout: {}", flat.id, err);
                skipped.push((flat.id, err));
            }
        }
    }
    Ok(PreparedLayout {
        parts,
        items,
        skipped,
    })
}

/// Search placements for prepared parts. Skipped parts count as unplaced.
pub fn compute_positions(
    prepared: &PreparedLayout,
    config: &LayoutConfig,
    cancel: &CancelHandle,
    observer: &mut dyn PackObserver,
) -> Result<LayoutOutcome, LayoutError> {
    if prepared.items.is_empty() {
        return Err(LayoutError::NothingPlaced);
    }
    let mut packer = Packer::new(prepared.items.clone(), config.clone())?;
    let outcome = packer.run(cancel, observer)?;
    if outcome.placed() == 0 {
        return Err(LayoutError::NothingPlaced);
    }
    Ok(LayoutOutcome {
        sheets: outcome.sheets,
        part_count: prepared.parts.len(),
        unplaced: outcome.unplaced + prepared.skipped.len(),
    })
}
