//! Structured schema documents (JSON).
//!
//! ```json
//! {
//!   "metadata": {"version": "Flight0.4"},
//!   "schema": {"constraints": [...], "indexes": [...], "relationships": [...]},
//!   "data": {"nodes": [...], "relationships": [...]},
//!   "verification": {"checks": [...]}
//! }
//! ```
//!
//! The schema section and verification checks are decoded strictly: a
//! malformed one makes the whole document unusable. Data items are decoded one
//! at a time so that a single bad record only rejects that record.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::model::{
    ConstraintSpec, EndpointSelector, IndexSpec, NodeSpec, RelationshipKind, RelationshipSpec,
    SchemaMetadata, SchemaModel,
};
use crate::error::{DecodeError, DecodeResult, ItemError};
use crate::property::{PropertyMap, PropertyValue};
use crate::stats::ItemFailure;
use crate::verify::SpotCheck;

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    metadata: SchemaMetadata,
    #[serde(default)]
    schema: RawSchemaSection,
    #[serde(default, alias = "sample_data")]
    data: RawDataSection,
    #[serde(default)]
    verification: RawVerification,
}

#[derive(Deserialize, Default)]
struct RawSchemaSection {
    #[serde(default)]
    constraints: Vec<ConstraintSpec>,
    #[serde(default)]
    indexes: Vec<IndexSpec>,
    #[serde(default)]
    relationships: Vec<RelationshipKind>,
}

#[derive(Deserialize, Default)]
struct RawDataSection {
    #[serde(default)]
    nodes: Vec<Value>,
    #[serde(default)]
    relationships: Vec<Value>,
}

#[derive(Deserialize, Default)]
struct RawVerification {
    #[serde(default)]
    checks: Vec<SpotCheck>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabels {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct RawNode {
    label: RawLabels,
    #[serde(default)]
    properties: PropertyMap,
}

#[derive(Deserialize)]
struct RawRelationship {
    #[serde(rename = "type")]
    rel_type: String,
    from: PropertyMap,
    to: PropertyMap,
    #[serde(default)]
    properties: PropertyMap,
    #[serde(default)]
    discriminator: Option<String>,
}

impl SchemaModel {
    /// Decode a schema document from JSON text.
    pub fn from_json_str(text: &str) -> DecodeResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(DecodeError::malformed("top-level value must be an object"));
        }
        let raw: RawDocument = serde_json::from_value(value)?;
        Ok(decode_document(raw))
    }

    /// Read and decode a schema document file.
    pub fn load_document(path: &std::path::Path) -> DecodeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DecodeError::io(path, e))?;
        Self::from_json_str(&text)
    }
}

fn decode_document(raw: RawDocument) -> SchemaModel {
    let version = raw.metadata.version.clone().unwrap_or_default();
    let mut model = SchemaModel {
        metadata: raw.metadata,
        constraints: raw.schema.constraints,
        indexes: raw.schema.indexes,
        relationship_kinds: raw.schema.relationships,
        checks: raw.verification.checks,
        ..Default::default()
    };

    for (index, value) in raw.data.nodes.into_iter().enumerate() {
        match decode_node(value, &version) {
            Ok(spec) => model.nodes.push(spec),
            Err(error) => model.rejected.push(ItemFailure::new(format!("node #{}", index + 1), error)),
        }
    }

    for (index, value) in raw.data.relationships.into_iter().enumerate() {
        match decode_relationship(value, &version, &model) {
            Ok(spec) => model.relationships.push(spec),
            Err(error) => model
                .rejected
                .push(ItemFailure::new(format!("relationship #{}", index + 1), error)),
        }
    }

    debug!(
        nodes = model.nodes.len(),
        relationships = model.relationships.len(),
        rejected = model.rejected.len(),
        "Decoded schema document"
    );
    model
}

fn decode_node(value: Value, default_version: &str) -> Result<NodeSpec, ItemError> {
    let raw: RawNode = serde_json::from_value(value).map_err(|e| ItemError::parse(e.to_string()))?;
    let labels = match raw.label {
        RawLabels::One(label) => vec![label],
        RawLabels::Many(labels) => labels,
    };
    let mut properties = raw.properties;
    let version = apply_version(&mut properties, default_version);
    NodeSpec::new(labels, properties, version)
}

fn decode_relationship(value: Value, default_version: &str, model: &SchemaModel) -> Result<RelationshipSpec, ItemError> {
    let raw: RawRelationship = serde_json::from_value(value).map_err(|e| ItemError::parse(e.to_string()))?;
    if raw.rel_type.trim().is_empty() {
        return Err(ItemError::parse("relationship has no type"));
    }
    let from = selector_from_map(raw.from, "from")?;
    let to = selector_from_map(raw.to, "to")?;

    let discriminator = raw
        .discriminator
        .or_else(|| model.declared_discriminator(&raw.rel_type).map(str::to_string));

    let mut properties = raw.properties;
    let version = apply_version(&mut properties, default_version);

    Ok(RelationshipSpec {
        rel_type: raw.rel_type,
        from,
        to,
        properties,
        discriminator,
        version,
    })
}

/// `{label: "Flight", flightId: "CA123"}` → selector on `Flight` by `flightId`.
fn selector_from_map(mut map: PropertyMap, side: &str) -> Result<EndpointSelector, ItemError> {
    let label = match map.remove("label") {
        Some(PropertyValue::String(label)) if !label.trim().is_empty() => label,
        _ => return Err(ItemError::parse(format!("'{}' endpoint has no label", side))),
    };
    if map.is_empty() {
        return Err(ItemError::parse(format!("'{}' endpoint has no key properties", side)));
    }
    Ok(EndpointSelector::new(label, map))
}

/// The entity's own `version` property wins; otherwise the document version is
/// copied into the properties.
fn apply_version(properties: &mut PropertyMap, default_version: &str) -> String {
    match properties.get("version").and_then(PropertyValue::as_str) {
        Some(v) => v.to_string(),
        None => {
            if !default_version.is_empty() && !properties.contains_key("version") {
                properties.insert("version".to_string(), default_version.into());
            }
            default_version.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLIGHT_DOC: &str = r#"{
        "metadata": {"version": "Flight0.4", "description": "Flight scenario"},
        "schema": {
            "constraints": [
                {"label": "Flight", "property": "flightId"},
                {"label": "Event", "property": "eventId"}
            ],
            "indexes": [{"label": "Flight", "property": "status"}],
            "relationships": [{"type": "TRIGGERS", "discriminator": "actionType"}]
        },
        "sample_data": {
            "nodes": [
                {"label": "Flight", "properties": {"flightId": "CA123-20240208", "status": "Delayed"}},
                {"label": ["Event", "FlightDelayedEvent"], "properties": {"eventId": "EVT-CA123-001", "delayMinutes": 45, "version": "Flight0.3"}},
                {"label": "Flight", "properties": "not a map"}
            ],
            "relationships": [
                {"type": "TRIGGERS", "from": {"label": "Event", "eventId": "EVT-CA123-001"}, "to": {"label": "Flight", "flightId": "CA123-20240208"}, "properties": {"actionType": "NOTIFY"}},
                {"type": "IMPACTS", "from": {"label": "Event"}, "to": {"label": "Flight", "flightId": "CA123-20240208"}}
            ]
        }
    }"#;

    #[test]
    fn test_decode_flight_document() {
        let model = SchemaModel::from_json_str(FLIGHT_DOC).unwrap();
        assert_eq!(model.version(), "Flight0.4");
        assert_eq!(model.constraints.len(), 2);
        assert_eq!(model.indexes.len(), 1);
        assert_eq!(model.nodes.len(), 2);
        assert_eq!(model.relationships.len(), 1);
        assert_eq!(model.rejected.len(), 2);
    }

    #[test]
    fn test_version_tagging() {
        let model = SchemaModel::from_json_str(FLIGHT_DOC).unwrap();
        let flight = &model.nodes[0];
        assert_eq!(flight.version, "Flight0.4");
        assert_eq!(flight.properties["version"], PropertyValue::from("Flight0.4"));

        let event = &model.nodes[1];
        assert_eq!(event.version, "Flight0.3");
        assert_eq!(event.labels, vec!["Event", "FlightDelayedEvent"]);
    }

    #[test]
    fn test_declared_discriminator_applies() {
        let model = SchemaModel::from_json_str(FLIGHT_DOC).unwrap();
        let triggers = &model.relationships[0];
        assert_eq!(triggers.discriminator.as_deref(), Some("actionType"));
        assert_eq!(triggers.from.label, "Event");
        assert_eq!(triggers.from.properties["eventId"], PropertyValue::from("EVT-CA123-001"));
    }

    #[test]
    fn test_rejected_items_reference_position() {
        let model = SchemaModel::from_json_str(FLIGHT_DOC).unwrap();
        assert_eq!(model.rejected[0].item, "node #3");
        assert_eq!(model.rejected[0].error.kind(), "parse");
        assert_eq!(model.rejected[1].item, "relationship #2");
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        assert!(SchemaModel::from_json_str("[1, 2]").is_err());
        assert!(SchemaModel::from_json_str("{\"schema\": {\"constraints\": [{\"label\": 1}]}}").is_err());
        assert!(SchemaModel::from_json_str("not json").is_err());
    }
}
