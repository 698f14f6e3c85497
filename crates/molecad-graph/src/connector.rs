//! Directed wires between an output and an input.

use molecad_core::UniqueId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a connector within its molecule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectorId(pub u64);

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// One end of a connector: an atom and the name of its slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub atom: UniqueId,
    pub name: String,
}

impl Endpoint {
    pub fn new(atom: UniqueId, name: impl Into<String>) -> Self {
        Self {
            atom,
            name: name.into(),
        }
    }
}

/// A wire from one atom's output to another atom's input.
///
/// Endpoints are id lookups into the owning molecule; a connector never
/// holds the atoms themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub id: ConnectorId,
    pub source: Endpoint,
    pub sink: Endpoint,
    pub sink_primary: bool,
    pub selected: bool,
}

impl Connector {
    pub fn record(&self) -> ConnectorRecord {
        ConnectorRecord {
            ap1_name: self.source.name.clone(),
            ap2_name: self.sink.name.clone(),
            ap2_primary: self.sink_primary,
            ap1_id: self.source.atom.clone(),
            ap2_id: self.sink.atom.clone(),
        }
    }

    pub fn touches(&self, atom: &UniqueId) -> bool {
        &self.source.atom == atom || &self.sink.atom == atom
    }
}

/// Persisted form of a connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    #[serde(rename = "ap1Name")]
    pub ap1_name: String,
    #[serde(rename = "ap2Name")]
    pub ap2_name: String,
    #[serde(rename = "ap2Primary", default)]
    pub ap2_primary: bool,
    #[serde(rename = "ap1ID")]
    pub ap1_id: UniqueId,
    #[serde(rename = "ap2ID")]
    pub ap2_id: UniqueId,
}
