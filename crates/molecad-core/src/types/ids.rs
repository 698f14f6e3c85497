//! Unique identifiers.
//!
//! Every atom carries a `UniqueId`, and the geometry service stores the atom's
//! result under the same id. Older project files wrote ids as JSON numbers,
//! so deserialization accepts numbers and strings alike.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Opaque, stable identifier of an atom and of its geometry library entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniqueId(String);

impl UniqueId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the textual form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a scoped id for an intermediate result owned by this id
    pub fn scoped(&self, suffix: &str) -> Self {
        Self(format!("{}:{}", self.0, suffix))
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UniqueId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UniqueId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for UniqueId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for UniqueId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Integer(u64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for UniqueId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Integer(n) => Self(n.to_string()),
            RawId::Float(f) => Self(f.to_string()),
            RawId::Text(s) => Self(s),
        })
    }
}
