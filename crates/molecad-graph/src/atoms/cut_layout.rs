//! The Cut Layout atom: nests its parts onto stock sheets.
//!
//! Normal propagation only replays the stored placements, which is cheap.
//! The packing search runs when [`crate::Project::compute_layout`] asks for
//! it, and its result replaces the stored placements. Better placements
//! found while the search runs are stored as they arrive. Stored
//! placements can also be edited one part at a time.

use molecad_geometry::layout::unplaced_warning;
use molecad_geometry::{GeometryReply, GeometryRequest, LayoutConfig, Placement, Sheets};
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use tracing::warn;

use super::{geometry_input, number_input};
use crate::atom::{AtomBehavior, Computation, ComputeCall};
use crate::attachment_point::AttachmentPoint;
use crate::context::Environment;
use crate::registry::AtomType;

pub const SHEET_WIDTH: &str = "Sheet Width";
pub const SHEET_HEIGHT: &str = "Sheet Height";
pub const PART_PADDING: &str = "Part Padding";

/// Edit of one stored placement; `index` counts across all sheets
#[derive(Debug, Deserialize)]
struct PositionEdit {
    index: usize,
    x: f64,
    y: f64,
    #[serde(default)]
    rotate: Option<f64>,
}

#[derive(Debug, Default)]
pub struct CutLayoutAtom {
    placements: Sheets,
}

impl CutLayoutAtom {
    pub fn placements(&self) -> &Sheets {
        &self.placements
    }

    fn placement_mut(&mut self, index: usize) -> Option<&mut Placement> {
        self.placements.iter_mut().flatten().nth(index)
    }

    fn config(call: &ComputeCall<'_>) -> Result<LayoutConfig, String> {
        Ok(LayoutConfig {
            width: call.number(SHEET_WIDTH)?,
            height: call.number(SHEET_HEIGHT)?,
            part_padding: call.number(PART_PADDING)?,
            units: call.units(),
            ..call.env.layout.clone()
        })
    }
}

impl AtomBehavior for CutLayoutAtom {
    fn atom_type(&self) -> AtomType {
        AtomType::CutLayout
    }

    fn inputs(&self, env: &Environment) -> Vec<AttachmentPoint> {
        vec![
            geometry_input("geometry"),
            number_input(SHEET_WIDTH, env.sheet.width),
            number_input(SHEET_HEIGHT, env.sheet.height),
            number_input(PART_PADDING, env.sheet.part_padding),
        ]
    }

    fn compute(&mut self, call: &ComputeCall<'_>) -> Computation {
        let result = call.geometry("geometry").and_then(|input| {
            if self.placements.is_empty() {
                // nothing laid out yet: show the parts as they are
                return Ok(GeometryRequest::Copy {
                    target: call.id.clone(),
                    input: Some(input),
                });
            }
            Ok(GeometryRequest::DisplayLayout {
                target: call.id.clone(),
                input,
                placements: self.placements.clone(),
                config: Self::config(call)?,
            })
        });
        match result {
            Ok(request) => Computation::Request(request),
            Err(reason) => Computation::Failed(reason),
        }
    }

    fn layout(&mut self, call: &ComputeCall<'_>) -> Option<Computation> {
        let computation = match call
            .geometry("geometry")
            .and_then(|input| Ok((input, Self::config(call)?)))
        {
            Ok((input, config)) => Computation::Layout { input, config },
            Err(reason) => Computation::Failed(reason),
        };
        Some(computation)
    }

    fn layout_improved(&mut self, sheets: &Sheets) {
        self.placements = sheets.clone();
    }

    fn set_property(&mut self, key: &str, value: &Json) -> Result<(), String> {
        match key {
            "placements" => {
                self.placements = serde_json::from_value(value.clone())
                    .map_err(|err| format!("Invalid placements: {}", err))?;
            }
            "position" => {
                let edit: PositionEdit = serde_json::from_value(value.clone())
                    .map_err(|err| format!("Invalid position: {}", err))?;
                let count = self.placements.iter().map(Vec::len).sum::<usize>();
                let placement = self.placement_mut(edit.index).ok_or_else(|| {
                    format!("No placement {} in a layout of {}", edit.index, count)
                })?;
                placement.translate.x = edit.x;
                placement.translate.y = edit.y;
                if let Some(rotate) = edit.rotate {
                    placement.rotate = rotate;
                }
            }
            _ => return Err(format!("Cut Layout has no property '{}'", key)),
        }
        Ok(())
    }

    fn finished(&mut self, reply: &GeometryReply) -> Option<String> {
        match reply {
            GeometryReply::Layout(outcome) => {
                self.placements = outcome.sheets.clone();
                (outcome.unplaced > 0).then(|| unplaced_warning(outcome.unplaced))
            }
            _ => None,
        }
    }

    fn save(&self, extra: &mut Map<String, Json>) {
        match serde_json::to_value(&self.placements) {
            Ok(json) => {
                extra.insert("placements".into(), json);
            }
            Err(err) => warn!("Could not serialize placements: {}", err),
        }
    }

    fn load(&mut self, extra: &Map<String, Json>) {
        let Some(json) = extra.get("placements") else {
            return;
        };
        if let Ok(sheets) = serde_json::from_value::<Sheets>(json.clone()) {
            self.placements = sheets;
        } else if let Ok(flat) = serde_json::from_value::<Vec<Placement>>(json.clone()) {
            // files written before multi-sheet layouts held one flat list
            self.placements = if flat.is_empty() { Vec::new() } else { vec![flat] };
        } else {
            warn!("Ignoring unreadable placements in Cut Layout");
        }
    }
}
