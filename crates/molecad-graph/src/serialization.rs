//! Project file format.
//!
//! A project is the JSON record of its top-level molecule. Every atom is
//! written as an [`AtomRecord`]; molecules add their children, connectors,
//! and metadata to the record's extra fields. Geometry is never written,
//! it is recomputed when the project loads.

use molecad_core::{GraphError, ProjectError, UniqueId, Units};
use molecad_geometry::BomEntry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::warn;

use crate::atom::{Atom, AtomBody};
use crate::connector::ConnectorRecord;
use crate::molecule::Molecule;
use crate::propagation::{Pass, Signal};
use crate::registry::AtomType;
use crate::value::Value;

/// Version written to `fileTypeVersion`
pub const FILE_TYPE_VERSION: u32 = 1;

fn current_version() -> u32 {
    FILE_TYPE_VERSION
}

fn molecule_tag() -> String {
    AtomType::Molecule.tag().to_string()
}

/// Saved value of one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoValue {
    pub name: String,
    #[serde(rename = "ioValue")]
    pub io_value: Json,
}

/// Persisted form of an atom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    #[serde(rename = "atomType", default = "molecule_tag")]
    pub atom_type: String,
    #[serde(rename = "uniqueID", default = "UniqueId::generate")]
    pub unique_id: UniqueId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(rename = "ioValues", default, skip_serializing_if = "Vec::is_empty")]
    pub io_values: Vec<IoValue>,
    /// Type-specific fields
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

impl AtomRecord {
    pub fn new(atom_type: AtomType, unique_id: UniqueId, name: &str, x: f64, y: f64) -> Self {
        Self {
            atom_type: atom_type.tag().to_string(),
            unique_id,
            name: Some(name.to_string()),
            x,
            y,
            io_values: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// Molecule fields carried in [`AtomRecord::extra`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoleculeFields {
    #[serde(default)]
    pub top_level: bool,
    #[serde(default)]
    pub all_atoms: Vec<Json>,
    #[serde(default)]
    pub all_connectors: Vec<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units_key: Option<String>,
    #[serde(default)]
    pub parent_repo: Option<Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compiled_bom: Vec<BomEntry>,
    #[serde(default = "current_version")]
    pub file_type_version: u32,
}

impl Atom {
    pub fn to_record(&self) -> AtomRecord {
        let io_values = self
            .inputs
            .iter()
            .filter(|ap| ap.value.is_persistent() && ap.value != Value::Empty)
            .map(|ap| IoValue {
                name: ap.name.clone(),
                io_value: ap.value.to_json(),
            })
            .collect();
        let mut extra = Map::new();
        match &self.body {
            AtomBody::Leaf(behavior) => behavior.save(&mut extra),
            AtomBody::Molecule(molecule) => match serde_json::to_value(molecule.fields()) {
                Ok(Json::Object(fields)) => extra.extend(fields),
                Ok(_) => {}
                Err(err) => warn!("Could not serialize molecule {}: {}", self.id, err),
            },
        }
        AtomRecord {
            atom_type: self.atom_type().tag().to_string(),
            unique_id: self.id.clone(),
            name: Some(self.name.clone()),
            x: self.x,
            y: self.y,
            io_values,
            extra,
        }
    }

    /// Rebuild an atom, and for a molecule everything inside it
    pub(crate) fn from_record(
        record: &AtomRecord,
        atom_type: AtomType,
        pass: &mut Pass,
    ) -> Result<(Atom, Vec<Signal>), GraphError> {
        let mut atom = Atom::new(record.unique_id.clone(), atom_type, &pass.env);
        atom.x = record.x;
        atom.y = record.y;
        if let Some(name) = &record.name {
            atom.name = name.clone();
        }

        let mut up = Vec::new();
        match &mut atom.body {
            AtomBody::Leaf(behavior) => {
                behavior.load(&record.extra);
                atom.inputs = behavior.inputs(&pass.env);
                atom.output = behavior.output();
            }
            AtomBody::Molecule(molecule) => {
                let fields: MoleculeFields =
                    serde_json::from_value(Json::Object(record.extra.clone())).map_err(|err| {
                        GraphError::Other {
                            message: format!("Malformed molecule {}: {}", record.unique_id, err),
                        }
                    })?;
                pass.path.push(record.unique_id.clone());
                let signals = molecule.load_fields(fields, pass);
                pass.path.pop();
                for signal in signals {
                    match signal {
                        Signal::AddInput(input) if atom.input(&input.name).is_none() => {
                            atom.inputs.push(input)
                        }
                        Signal::AddInput(_) => {}
                        other => up.push(other),
                    }
                }
            }
        }
        atom.refresh_name();

        for io in &record.io_values {
            if atom.input(&io.name).is_none() {
                if let AtomBody::Leaf(behavior) = &atom.body {
                    if let Some(input) = behavior.restore_input(&io.name) {
                        atom.inputs.push(input);
                    }
                }
            }
            match atom.input_mut(&io.name) {
                Some(input) => {
                    let value = Value::from_json(&io.io_value, input.value_type);
                    input.set_value(value);
                }
                None => warn!("{} {} has no input '{}'", atom_type, atom.id, io.name),
            }
        }
        let Atom { inputs, body, .. } = &mut atom;
        if let AtomBody::Molecule(molecule) = body {
            for input in inputs.iter() {
                molecule.seed_input(&input.name, input.value.clone());
            }
        }
        Ok((atom, up))
    }
}

impl Molecule {
    pub fn fields(&self) -> MoleculeFields {
        MoleculeFields {
            top_level: self.top_level,
            all_atoms: self
                .atoms
                .iter()
                .filter_map(|atom| serde_json::to_value(atom.to_record()).ok())
                .collect(),
            all_connectors: self
                .connectors
                .iter()
                .filter_map(|connector| serde_json::to_value(connector.record()).ok())
                .collect(),
            units_key: Some(self.units.key().to_string()),
            parent_repo: self.parent_repo.clone(),
            compiled_bom: self.compiled_bom.clone(),
            file_type_version: FILE_TYPE_VERSION,
        }
    }

    /// Fill an empty molecule from its saved fields.
    ///
    /// Unreadable atoms and connectors are skipped with a warning so the
    /// rest of the project still loads.
    pub(crate) fn load_fields(&mut self, fields: MoleculeFields, pass: &mut Pass) -> Vec<Signal> {
        self.top_level = fields.top_level;
        if let Some(units) = fields.units_key.as_deref().and_then(|k| k.parse::<Units>().ok()) {
            self.units = units;
        }
        self.parent_repo = fields.parent_repo;
        self.compiled_bom = fields.compiled_bom;

        let mut up = Vec::new();
        let output = AtomRecord::new(AtomType::Output, UniqueId::generate(), "Output", 0.9, 0.5);
        match self.place_atom(output, false, pass) {
            Ok((_, signals)) => up.extend(signals),
            Err(err) => warn!("Could not place the default output: {}", err),
        }
        for json in fields.all_atoms {
            match serde_json::from_value::<AtomRecord>(json) {
                Ok(record) => match self.place_atom(record, false, pass) {
                    Ok((_, signals)) => up.extend(signals),
                    Err(err) => warn!("Skipping atom: {}", err),
                },
                Err(err) => warn!("Skipping unreadable atom: {}", err),
            }
        }
        for json in fields.all_connectors {
            match serde_json::from_value::<ConnectorRecord>(json) {
                Ok(record) => match self.place_connector(&record, pass) {
                    Ok((_, signals)) => up.extend(signals),
                    Err(err) => warn!("Unable to place connector: {}", err),
                },
                Err(err) => warn!("Unable to place connector: {}", err),
            }
        }
        up
    }
}

/// Parse a project document into its top-level record
pub fn parse_project(text: &str) -> Result<AtomRecord, ProjectError> {
    let record: AtomRecord = serde_json::from_str(text).map_err(|err| ProjectError::Malformed {
        reason: err.to_string(),
    })?;
    let version = record
        .extra
        .get("fileTypeVersion")
        .and_then(Json::as_u64)
        .unwrap_or(u64::from(FILE_TYPE_VERSION));
    if version > u64::from(FILE_TYPE_VERSION) {
        return Err(ProjectError::UnsupportedVersion {
            version: u32::try_from(version).unwrap_or(u32::MAX),
        });
    }
    if AtomType::from_tag(&record.atom_type) != Some(AtomType::Molecule) {
        return Err(ProjectError::Malformed {
            reason: format!("top level is a {}, not a molecule", record.atom_type),
        });
    }
    Ok(record)
}
