//! Values carried by attachment points.

use molecad_core::UniqueId;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// Type of value an attachment point accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Number,
    String,
    Geometry,
    Array,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Geometry => "geometry",
            Self::Array => "array",
        }
    }

    /// Parse the persisted tag; unknown tags read as numbers
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "string" => Self::String,
            "geometry" => Self::Geometry,
            "array" => Self::Array,
            _ => Self::Number,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value flowing along a connector
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Number(f64),
    Text(String),
    /// Library key of a geometry result
    Geometry(UniqueId),
    Array(Vec<Value>),
    #[default]
    Empty,
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::Geometry(_) => "geometry",
            Self::Array(_) => "array",
            Self::Empty => "nothing",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn as_geometry(&self) -> Option<&UniqueId> {
        match self {
            Self::Geometry(id) => Some(id),
            _ => None,
        }
    }

    /// Whether the value can be written to a project file. Geometry keys
    /// point into the running service and are rebuilt on load.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Geometry(_))
    }

    pub fn to_json(&self) -> Json {
        match self {
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Text(s) => Json::String(s.clone()),
            Self::Geometry(id) => Json::String(id.to_string()),
            Self::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Empty => Json::Null,
        }
    }

    /// Read a persisted value. Strings that hold a number become numbers
    /// when the slot expects one.
    pub fn from_json(json: &Json, expected: ValueType) -> Self {
        match json {
            Json::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Empty),
            Json::String(s) if expected == ValueType::Number => s
                .trim()
                .parse()
                .map(Self::Number)
                .unwrap_or_else(|_| Self::Text(s.clone())),
            Json::String(s) => Self::Text(s.clone()),
            Json::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            Json::Array(items) => Self::Array(
                items
                    .iter()
                    .map(|item| Self::from_json(item, ValueType::Number))
                    .collect(),
            ),
            Json::Null | Json::Object(_) => Self::Empty,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<UniqueId> for Value {
    fn from(value: UniqueId) -> Self {
        Self::Geometry(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_strings_read_as_numbers() {
        assert_eq!(
            Value::from_json(&json!("12.5"), ValueType::Number),
            Value::Number(12.5)
        );
        assert_eq!(
            Value::from_json(&json!("cut"), ValueType::Number),
            Value::Text("cut".into())
        );
        assert_eq!(
            Value::from_json(&json!("12"), ValueType::String),
            Value::Text("12".into())
        );
    }

    #[test]
    fn test_geometry_is_not_persisted() {
        assert!(!Value::Geometry(UniqueId::from("a")).is_persistent());
        assert!(Value::Number(1.0).is_persistent());
        assert_eq!(Value::Number(f64::NAN).to_json(), Json::Null);
    }
}
