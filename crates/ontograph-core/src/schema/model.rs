//! Schema domain models.

use serde::{Deserialize, Serialize};

use crate::error::ItemError;
use crate::property::{describe_properties, PropertyMap, PropertyValue};
use crate::stats::ItemFailure;
use crate::verify::SpotCheck;

/// Document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaMetadata {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Declares that `property` uniquely identifies nodes carrying `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub label: String,
    pub property: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ConstraintSpec {
    /// Constraint name: explicit, or `{label_lower}_{property}_unique`.
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_{}_unique", self.label.to_lowercase(), self.property))
    }
}

/// A single-property index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub label: String,
    pub property: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexSpec {
    /// Index name: explicit, or `{label_lower}_{property}_index`.
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_{}_index", self.label.to_lowercase(), self.property))
    }
}

/// Schema-level declaration for a relationship type.
///
/// A discriminator declared here applies to every relationship of the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipKind {
    #[serde(rename = "type")]
    pub rel_type: String,
    #[serde(default)]
    pub discriminator: Option<String>,
}

/// Desired state of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub labels: Vec<String>,
    pub properties: PropertyMap,
    pub version: String,
}

impl NodeSpec {
    /// Build a node spec. The label list must be non-empty; the first label is
    /// the primary label.
    pub fn new(labels: Vec<String>, properties: PropertyMap, version: impl Into<String>) -> Result<Self, ItemError> {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if labels.is_empty() {
            return Err(ItemError::parse("node has no labels"));
        }
        Ok(Self {
            labels,
            properties,
            version: version.into(),
        })
    }

    /// First label. `None` only for specs assembled without [`NodeSpec::new`].
    pub fn primary_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// `Flight:Event` style label string for logs.
    pub fn label_string(&self) -> String {
        self.labels.join(":")
    }

    /// Short description used in error records: labels plus key value when known.
    pub fn describe(&self, key_property: Option<&str>) -> String {
        match key_property.and_then(|k| self.properties.get(k).map(|v| (k, v))) {
            Some((k, v)) => format!("(:{} {{{}: {}}})", self.label_string(), k, v),
            None => format!("(:{} {})", self.label_string(), describe_properties(&self.properties)),
        }
    }
}

/// Selects one node by label and key properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSelector {
    pub label: String,
    #[serde(rename = "match")]
    pub properties: PropertyMap,
}

impl EndpointSelector {
    pub fn new(label: impl Into<String>, properties: PropertyMap) -> Self {
        Self {
            label: label.into(),
            properties,
        }
    }

    /// Selector with a single key property.
    pub fn by_key(label: impl Into<String>, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        let mut properties = PropertyMap::new();
        properties.insert(key.into(), value.into());
        Self::new(label, properties)
    }

    pub fn describe(&self) -> String {
        format!("(:{} {})", self.label, describe_properties(&self.properties))
    }
}

/// Desired state of one relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipSpec {
    pub rel_type: String,
    pub from: EndpointSelector,
    pub to: EndpointSelector,
    pub properties: PropertyMap,
    /// Property whose value participates in relationship identity.
    pub discriminator: Option<String>,
    pub version: String,
}

impl RelationshipSpec {
    pub fn describe(&self) -> String {
        let disc = self
            .discriminator
            .as_ref()
            .and_then(|d| self.properties.get(d).map(|v| format!(" {{{}: {}}}", d, v)))
            .unwrap_or_default();
        format!(
            "{}-[:{}{}]->{}",
            self.from.describe(),
            self.rel_type,
            disc,
            self.to.describe()
        )
    }
}

/// Everything one import run consumes.
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    pub metadata: SchemaMetadata,
    pub constraints: Vec<ConstraintSpec>,
    pub indexes: Vec<IndexSpec>,
    pub relationship_kinds: Vec<RelationshipKind>,
    pub nodes: Vec<NodeSpec>,
    pub relationships: Vec<RelationshipSpec>,
    /// Spot checks declared by the source; empty means "use defaults".
    pub checks: Vec<SpotCheck>,
    /// Records the decoder could not turn into specs.
    pub rejected: Vec<ItemFailure>,
}

impl SchemaModel {
    pub fn version(&self) -> &str {
        self.metadata.version.as_deref().unwrap_or("")
    }

    /// Discriminator declared at schema level for a relationship type.
    pub fn declared_discriminator(&self, rel_type: &str) -> Option<&str> {
        self.relationship_kinds
            .iter()
            .rev()
            .find(|k| k.rel_type == rel_type)
            .and_then(|k| k.discriminator.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_spec_requires_label() {
        assert!(NodeSpec::new(vec![], PropertyMap::new(), "v1").is_err());
        assert!(NodeSpec::new(vec![" ".to_string()], PropertyMap::new(), "v1").is_err());

        let unlabeled = NodeSpec {
            labels: Vec::new(),
            properties: PropertyMap::new(),
            version: "v1".to_string(),
        };
        assert_eq!(unlabeled.primary_label(), None);

        let spec = NodeSpec::new(
            vec!["Event".to_string(), "FlightDelayedEvent".to_string()],
            PropertyMap::new(),
            "v1",
        )
        .unwrap();
        assert_eq!(spec.primary_label(), Some("Event"));
        assert_eq!(spec.label_string(), "Event:FlightDelayedEvent");
    }

    #[test]
    fn test_default_names() {
        let c = ConstraintSpec {
            label: "Flight".to_string(),
            property: "flightId".to_string(),
            name: None,
        };
        assert_eq!(c.name(), "flight_flightId_unique");

        let i = IndexSpec {
            label: "Flight".to_string(),
            property: "status".to_string(),
            name: Some("flight_status".to_string()),
        };
        assert_eq!(i.name(), "flight_status");
    }

    #[test]
    fn test_relationship_describe_includes_discriminator() {
        let mut properties = PropertyMap::new();
        properties.insert("actionType".to_string(), "NOTIFY".into());
        let spec = RelationshipSpec {
            rel_type: "TRIGGERS".to_string(),
            from: EndpointSelector::by_key("Event", "eventId", "E1"),
            to: EndpointSelector::by_key("Flight", "flightId", "F1"),
            properties,
            discriminator: Some("actionType".to_string()),
            version: String::new(),
        };
        assert_eq!(
            spec.describe(),
            "(:Event {eventId: E1})-[:TRIGGERS {actionType: NOTIFY}]->(:Flight {flightId: F1})"
        );
    }
}
