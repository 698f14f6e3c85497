//! Whole-project chores for headless sessions: finding every Cut Layout,
//! running their searches, and collecting what went wrong.

use molecad_core::{EventFilter, GraphError, GraphEvent, ProgressEvent, UniqueId};
use tracing::{debug, info};

use crate::atom::Atom;
use crate::project::Project;
use crate::registry::AtomType;

/// Paths to every Cut Layout in the project, as molecule ids then the atom id
pub fn cut_layouts(project: &Project) -> Vec<Vec<UniqueId>> {
    fn walk(atom: &Atom, path: &mut Vec<UniqueId>, found: &mut Vec<Vec<UniqueId>>) {
        let Some(molecule) = atom.molecule() else {
            return;
        };
        for child in molecule.atoms() {
            path.push(child.id.clone());
            if child.atom_type() == AtomType::CutLayout {
                found.push(path.clone());
            }
            walk(child, path, found);
            path.pop();
        }
    }

    let mut found = Vec::new();
    walk(project.root(), &mut Vec::new(), &mut found);
    found
}

fn go_to_top(project: &mut Project) -> Result<(), GraphError> {
    while !project.current_path().is_empty() {
        project.go_to_parent_molecule()?;
    }
    Ok(())
}

async fn compute_one(
    project: &mut Project,
    molecules: &[UniqueId],
    atom: &UniqueId,
) -> Result<(), GraphError> {
    go_to_top(project)?;
    for id in molecules {
        project.enter_molecule(id)?;
    }
    info!("Computing layout of {}", atom);
    project.compute_layout(atom)?;
    project.run_until_idle().await;
    // leaving the molecule releases the output it held while displayed
    go_to_top(project)?;
    project.run_until_idle().await;
    Ok(())
}

/// Run the packing search of every Cut Layout and wait for the results
pub async fn compute_layouts(project: &mut Project) -> Result<usize, GraphError> {
    let layouts = cut_layouts(project);
    for path in &layouts {
        let Some((atom, molecules)) = path.split_last() else {
            continue;
        };
        let subscription = project
            .bus()
            .subscribe(EventFilter::Atom(atom.clone()), |event| {
                if let GraphEvent::Progress(ProgressEvent::Layout { atom, fraction }) = event {
                    debug!("Layout of {} at {:.0}%", atom, fraction * 100.0);
                }
            });
        let result = compute_one(project, molecules, atom).await;
        project.bus().unsubscribe(subscription);
        result?;
    }
    Ok(layouts.len())
}

/// Alerts and warnings left on atoms, as (atom name, message)
pub fn problems(project: &Project) -> Vec<(String, String)> {
    fn walk(atom: &Atom, found: &mut Vec<(String, String)>) {
        for message in atom.alert.iter().chain(atom.warning.iter()) {
            found.push((atom.name.clone(), message.clone()));
        }
        if let Some(molecule) = atom.molecule() {
            for child in molecule.atoms() {
                walk(child, found);
            }
        }
    }

    let mut found = Vec::new();
    walk(project.root(), &mut found);
    found
}
