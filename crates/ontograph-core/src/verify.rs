//! Verification expectations and reports.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::keys::UniqueKeyMap;
use crate::schema::{EndpointSelector, SchemaModel};

fn default_min_depth() -> u32 {
    1
}

/// A named structural check run against the store after an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotCheck {
    pub name: String,
    #[serde(flatten)]
    pub kind: SpotCheckKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpotCheckKind {
    /// A node matching the selector exists.
    NodeExists { node: EndpointSelector },

    /// A relationship of the type exists between the two selected nodes.
    RelationshipExists {
        #[serde(rename = "type")]
        rel_type: String,
        from: EndpointSelector,
        to: EndpointSelector,
    },

    /// The longest chain of `rel_type` hops starting at a `label` node (and
    /// ending at `root`, when given) is within `[min_depth, max_depth]`.
    ChainDepth {
        #[serde(rename = "type")]
        rel_type: String,
        label: String,
        #[serde(default)]
        root: Option<EndpointSelector>,
        #[serde(default = "default_min_depth")]
        min_depth: u32,
        max_depth: u32,
    },
}

/// What the verifier should count and check.
#[derive(Debug, Clone, Default)]
pub struct VerificationSpec {
    pub labels: Vec<String>,
    pub relationship_types: Vec<String>,
    /// Minimum node count per label: the number of distinct keys imported.
    pub expected_minimums: BTreeMap<String, i64>,
    pub checks: Vec<SpotCheck>,
}

impl VerificationSpec {
    /// Derive expectations from the schema that was imported.
    ///
    /// Uses the schema's declared checks; when it declares none, checks that
    /// the first node and the first relationship of the input exist.
    pub fn from_schema(schema: &SchemaModel) -> Self {
        let keys = UniqueKeyMap::resolve(&schema.constraints);

        let mut labels = BTreeSet::new();
        let mut distinct_keys: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for c in &schema.constraints {
            labels.insert(c.label.clone());
        }
        for node in &schema.nodes {
            let Some(primary) = node.primary_label() else {
                continue;
            };
            labels.insert(primary.to_string());
            if let Ok(key) = keys.lookup(primary) {
                if let Some(value) = node.properties.get(key).filter(|v| !v.is_blank()) {
                    distinct_keys
                        .entry(primary.to_string())
                        .or_default()
                        .insert(value.to_string());
                }
            }
        }

        let relationship_types: BTreeSet<String> =
            schema.relationships.iter().map(|r| r.rel_type.clone()).collect();

        let checks = if schema.checks.is_empty() {
            default_checks(schema, &keys)
        } else {
            schema.checks.clone()
        };

        Self {
            labels: labels.into_iter().collect(),
            relationship_types: relationship_types.into_iter().collect(),
            expected_minimums: distinct_keys
                .into_iter()
                .map(|(label, values)| (label, values.len() as i64))
                .collect(),
            checks,
        }
    }
}

fn default_checks(schema: &SchemaModel, keys: &UniqueKeyMap) -> Vec<SpotCheck> {
    let mut checks = Vec::new();

    if let Some(node) = schema.nodes.first() {
        if let Some((primary, Ok(key))) = node.primary_label().map(|l| (l, keys.lookup(l))) {
            if let Some(value) = node.properties.get(key) {
                checks.push(SpotCheck {
                    name: format!("{} {} exists", primary, value),
                    kind: SpotCheckKind::NodeExists {
                        node: EndpointSelector::by_key(primary, key, value.clone()),
                    },
                });
            }
        }
    }

    if let Some(rel) = schema.relationships.first() {
        checks.push(SpotCheck {
            name: format!("{} relationship exists", rel.rel_type),
            kind: SpotCheckKind::RelationshipExists {
                rel_type: rel.rel_type.clone(),
                from: rel.from.clone(),
                to: rel.to.clone(),
            },
        });
    }

    checks
}

/// Outcome of one named check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Shape of the store observed after a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub node_counts: BTreeMap<String, i64>,
    pub relationship_counts: BTreeMap<String, i64>,
    pub checks: Vec<CheckResult>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn total_nodes(&self) -> i64 {
        self.node_counts.values().sum()
    }

    pub fn total_relationships(&self) -> i64 {
        self.relationship_counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_check_document_shape() {
        let checks: Vec<SpotCheck> = serde_json::from_str(
            r#"[
                {"name": "CA123 exists", "kind": "node_exists", "node": {"label": "Flight", "match": {"flightId": "CA123-20240208"}}},
                {"name": "inheritance depth", "kind": "chain_depth", "type": "INHERITANCE", "label": "OntologyClass",
                 "root": {"label": "OntologyClass", "match": {"name": "O_Object"}}, "max_depth": 6}
            ]"#,
        )
        .unwrap();
        assert_eq!(checks.len(), 2);
        match &checks[1].kind {
            SpotCheckKind::ChainDepth { min_depth, max_depth, root, .. } => {
                assert_eq!(*min_depth, 1);
                assert_eq!(*max_depth, 6);
                assert!(root.is_some());
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_from_schema_defaults() {
        let schema = SchemaModel::from_json_str(
            r#"{
                "schema": {"constraints": [{"label": "Flight", "property": "flightId"}, {"label": "Gate", "property": "gateId"}]},
                "data": {
                    "nodes": [
                        {"label": "Flight", "properties": {"flightId": "F1"}},
                        {"label": "Flight", "properties": {"flightId": "F1", "status": "OnTime"}},
                        {"label": "Gate", "properties": {"gateId": "G1"}}
                    ],
                    "relationships": [
                        {"type": "ASSIGNED_TO", "from": {"label": "Flight", "flightId": "F1"}, "to": {"label": "Gate", "gateId": "G1"}}
                    ]
                }
            }"#,
        )
        .unwrap();

        let spec = VerificationSpec::from_schema(&schema);
        assert_eq!(spec.labels, vec!["Flight", "Gate"]);
        assert_eq!(spec.relationship_types, vec!["ASSIGNED_TO"]);
        assert_eq!(spec.expected_minimums["Flight"], 1);
        assert_eq!(spec.checks.len(), 2);
        assert!(matches!(spec.checks[0].kind, SpotCheckKind::NodeExists { .. }));
        assert!(matches!(spec.checks[1].kind, SpotCheckKind::RelationshipExists { .. }));
    }

    #[test]
    fn test_report_passed() {
        let mut report = VerificationReport::default();
        assert!(report.passed());
        report.checks.push(CheckResult {
            name: "x".to_string(),
            passed: false,
            detail: "missing".to_string(),
        });
        assert!(!report.passed());
        assert_eq!(report.failed_checks().count(), 1);
    }
}
