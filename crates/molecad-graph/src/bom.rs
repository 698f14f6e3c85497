//! Bill of materials: merging tagged entries and rendering the markdown table.

use molecad_geometry::BomEntry;
use std::fmt::Write;

const AMAZON_AFFILIATE_TAG: &str = "maslowcnc01-20";

/// Merge entries that name the same item and sort them by source
pub fn compile_bom(entries: Vec<BomEntry>) -> Vec<BomEntry> {
    let mut merged: Vec<BomEntry> = Vec::new();
    for entry in entries {
        match merged.iter_mut().find(|e| e.item == entry.item) {
            Some(existing) => {
                existing.number_needed += entry.number_needed;
                existing.cost_usd += entry.cost_usd;
            }
            None => merged.push(entry),
        }
    }
    merged.sort_by(|a, b| a.source.cmp(&b.source));
    merged
}

fn source_link(source: &str) -> String {
    if source.contains("amazon") {
        format!("[Amazon]({}?tag={})", source, AMAZON_AFFILIATE_TAG)
    } else {
        source.to_string()
    }
}

/// Render the BOM as the markdown file written next to a project
pub fn format_bom(entries: &[BomEntry]) -> String {
    let mut out = String::from(
        "###### Note: Do not edit this file directly, it is automatically generated from the CAD model \n# Bill Of Materials \n |Part|Number Needed|Price|Source| \n |----|----------|-----|-----|",
    );
    let mut total_qty = 0.0;
    let mut total_cost = 0.0;
    for entry in entries {
        total_qty += entry.number_needed;
        total_cost += entry.cost_usd;
        let _ = write!(
            out,
            "\n|{}|{}|${:.2}|{}|",
            entry.item,
            entry.number_needed,
            entry.cost_usd,
            source_link(&entry.source)
        );
    }
    let _ = write!(out, "\n|Total: |{}|${:.2}| |", total_qty, total_cost);
    let _ = write!(out, "\n\n 3xCOG MSRP: ${:.2}", 3.0 * total_cost);
    out
}
