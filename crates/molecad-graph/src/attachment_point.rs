//! Typed, named input and output slots on an atom.

use crate::connector::ConnectorId;
use crate::value::{Value, ValueType};

/// Radius of an atom body in normalised canvas units
pub const ATOM_RADIUS: f64 = 1.0 / 72.0;

/// Radius around an attachment point that counts as a hit
pub const ATTACHMENT_RADIUS: f64 = ATOM_RADIUS / 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A slot that holds the value flowing in or out of an atom.
///
/// An input is fed by at most one connector; an output may feed many.
/// `ready` is false while an upstream recomputation is pending.
#[derive(Debug, Clone)]
pub struct AttachmentPoint {
    pub name: String,
    pub direction: Direction,
    pub value_type: ValueType,
    pub value: Value,
    pub default_value: Value,
    pub ready: bool,
    /// Receives the value when a wire is dropped on the atom body
    pub primary: bool,
    connectors: Vec<ConnectorId>,
}

impl AttachmentPoint {
    pub fn input(name: impl Into<String>, value_type: ValueType, default_value: Value) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Input,
            value_type,
            value: default_value.clone(),
            default_value,
            ready: true,
            primary: false,
            connectors: Vec::new(),
        }
    }

    pub fn output(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Output,
            value_type,
            value: Value::Empty,
            default_value: Value::Empty,
            ready: false,
            primary: false,
            connectors: Vec::new(),
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = value;
        self.ready = true;
    }

    /// Mark the slot stale. Returns false when it already was, which is
    /// where lock propagation stops.
    pub fn lock(&mut self) -> bool {
        let was_ready = self.ready;
        self.ready = false;
        was_ready
    }

    pub fn reset_to_default(&mut self) {
        self.value = self.default_value.clone();
        self.ready = true;
    }

    pub fn connectors(&self) -> &[ConnectorId] {
        &self.connectors
    }

    pub fn is_connected(&self) -> bool {
        !self.connectors.is_empty()
    }

    pub(crate) fn attach(&mut self, id: ConnectorId) {
        if !self.connectors.contains(&id) {
            self.connectors.push(id);
        }
    }

    /// Detach a connector. An input falls back to its default unless `silent`.
    pub(crate) fn delete_connector(&mut self, id: ConnectorId, silent: bool) -> bool {
        let before = self.connectors.len();
        self.connectors.retain(|c| *c != id);
        let removed = self.connectors.len() != before;
        if removed && self.is_input() && !silent {
            self.reset_to_default();
        }
        removed
    }

    /// Hit test of a pointer against the slot drawn at `position`
    pub fn was_connection_made(&self, pointer: (f64, f64), position: (f64, f64)) -> bool {
        let dx = pointer.0 - position.0;
        let dy = pointer.1 - position.1;
        (dx * dx + dy * dy).sqrt() <= ATTACHMENT_RADIUS
    }
}
