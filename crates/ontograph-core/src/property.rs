//! Property values carried by nodes and relationships.
//!
//! Properties are a tagged union of scalar kinds plus nested lists and maps,
//! so that "full replace" writes and JSON round trips are well-defined.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered property map. Ordering keeps generated statements and logs stable.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(PropertyMap),
}

impl PropertyValue {
    /// True when the value cannot serve as a business key: null or an empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            PropertyValue::Null => true,
            PropertyValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to the shape a property graph can hold.
    ///
    /// Nested maps (and maps inside lists) become JSON strings. Returns `None`
    /// for null, which the store treats as "property absent".
    pub fn to_storable(&self) -> Option<PropertyValue> {
        match self {
            PropertyValue::Null => None,
            PropertyValue::Map(map) => Some(PropertyValue::String(
                serde_json::to_string(map).unwrap_or_default(),
            )),
            PropertyValue::List(items) => Some(PropertyValue::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        PropertyValue::List(_) => Some(PropertyValue::String(
                            serde_json::to_string(item).unwrap_or_default(),
                        )),
                        other => other.to_storable(),
                    })
                    .collect(),
            )),
            other => Some(other.clone()),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(x) => write!(f, "{}", x),
            PropertyValue::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", serde_json::to_string(other).unwrap_or_default()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(x: f64) -> Self {
        PropertyValue::Float(x)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(map: PropertyMap) -> Self {
        PropertyValue::Map(map)
    }
}

/// Storable copy of a property map: nulls dropped, nested maps flattened to JSON.
pub fn storable_properties(props: &PropertyMap) -> PropertyMap {
    props
        .iter()
        .filter_map(|(k, v)| v.to_storable().map(|v| (k.clone(), v)))
        .collect()
}

/// Render `{key: value, ...}` for log lines and item descriptions.
pub fn describe_properties(props: &PropertyMap) -> String {
    let parts: Vec<String> = props.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    format!("{{{}}}", parts.join(", "))
}
