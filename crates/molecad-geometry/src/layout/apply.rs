//! Moving flattened parts to their placements.

use tracing::warn;

use super::orientation::FlatPart;
use super::{Placement, Sheets};
use crate::model::GeometryNode;

/// Find the sheet and placement for a part id.
fn lookup(sheets: &Sheets, id: usize) -> Option<(usize, &Placement)> {
    for (index, sheet) in sheets.iter().enumerate() {
        let mut matches = sheet.iter().filter(|p| p.id == id);
        if let Some(first) = matches.next() {
            if matches.next().is_some() {
                warn!("Found more than one placement for part {}", id);
            }
            return Some((index, first));
        }
    }
    None
}

/// Build the laid-out assembly. Each part is rotated about the sheet normal
/// at the origin, then translated; every sheet after the first is shifted
/// up by `sheet_height` so sheets stack without overlapping. Parts without
/// a placement are left out.
pub fn apply_layout(parts: &[FlatPart], sheets: &Sheets, sheet_height: f64) -> GeometryNode {
    let children = parts
        .iter()
        .filter_map(|flat| {
            let Some((sheet, placement)) = lookup(sheets, flat.id) else {
                warn!("No placement for part {}", flat.id);
                return None;
            };
            let shape = flat.part.shape.rotated(0.0, 0.0, placement.rotate).translated(
                placement.translate.x,
                placement.translate.y + sheet as f64 * sheet_height,
                0.0,
            );
            Some(GeometryNode::Part(flat.part.with_shape(shape)))
        })
        .collect();

    GeometryNode::Assembly {
        children,
        tags: Vec::new(),
        bom: Vec::new(),
    }
}
