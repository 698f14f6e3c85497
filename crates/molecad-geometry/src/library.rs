//! Keyed store of computed geometry.

use molecad_core::{GeometryError, UniqueId};
use std::collections::HashMap;

use crate::model::GeometryNode;

/// Geometry results keyed by the id of the atom that produced them
///
/// Every write to a key bumps that key's revision. A long job claims a
/// revision when it starts and may only write back if nothing else wrote
/// the key meanwhile.
#[derive(Debug, Default)]
pub struct GeometryLibrary {
    entries: HashMap<UniqueId, GeometryNode>,
    revisions: HashMap<UniqueId, u64>,
}

impl GeometryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &UniqueId) -> Result<&GeometryNode, GeometryError> {
        self.entries.get(id).ok_or_else(|| GeometryError::NotFound {
            id: id.to_string(),
        })
    }

    pub fn insert(&mut self, id: UniqueId, node: GeometryNode) {
        self.bump(&id);
        self.entries.insert(id, node);
    }

    pub fn remove(&mut self, id: &UniqueId) -> Option<GeometryNode> {
        self.bump(id);
        self.entries.remove(id)
    }

    /// Claim the next revision of `id` for a write that lands later
    pub fn reserve(&mut self, id: &UniqueId) -> u64 {
        self.bump(id)
    }

    /// Write `node` only if `revision` is still the latest claim on `id`
    ///
    /// The claim stays valid afterwards, so one search can write its
    /// improving results repeatedly.
    pub fn insert_if_current(&mut self, id: UniqueId, revision: u64, node: GeometryNode) -> bool {
        if self.revisions.get(&id) != Some(&revision) {
            return false;
        }
        self.entries.insert(id, node);
        true
    }

    fn bump(&mut self, id: &UniqueId) -> u64 {
        let revision = self.revisions.entry(id.clone()).or_insert(0);
        *revision += 1;
        *revision
    }

    pub fn contains(&self, id: &UniqueId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
