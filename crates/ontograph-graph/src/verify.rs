//! Post-import verification: counts plus named spot checks.

use ontograph_core::{
    CheckResult, EndpointSelector, ItemError, PropertyValue, SpotCheck, SpotCheckKind, VerificationReport,
    VerificationSpec, Vocabulary,
};
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::store::{GraphStore, NodeMatch, SpotCheckQuery};

/// Runs the verification queries for a [`VerificationSpec`].
#[derive(Debug, Clone, Default)]
pub struct Verifier;

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Count by label and type, then run every spot check.
    ///
    /// Check failures are reported, never raised. Only transport failures
    /// propagate.
    pub async fn verify(
        &self,
        store: &dyn GraphStore,
        spec: &VerificationSpec,
        vocabulary: &Vocabulary,
    ) -> StoreResult<VerificationReport> {
        let mut report = VerificationReport::default();

        for label in &spec.labels {
            if let Ok(ident) = vocabulary.label(label) {
                report.node_counts.insert(label.clone(), store.count_nodes(&ident).await?);
            }
        }
        for rel_type in &spec.relationship_types {
            if let Ok(ident) = vocabulary.relationship_type(rel_type) {
                report
                    .relationship_counts
                    .insert(rel_type.clone(), store.count_relationships(&ident).await?);
            }
        }

        if !spec.expected_minimums.is_empty() {
            report.checks.push(label_counts_check(spec, &report));
        }

        for check in &spec.checks {
            let result = self.run_check(store, check, vocabulary).await?;
            if !result.passed {
                warn!(check = %result.name, detail = %result.detail, "Spot check failed");
            }
            report.checks.push(result);
        }

        info!(
            nodes = report.total_nodes(),
            relationships = report.total_relationships(),
            checks = report.checks.len(),
            passed = report.passed(),
            "Verification complete"
        );
        Ok(report)
    }

    async fn run_check(
        &self,
        store: &dyn GraphStore,
        check: &SpotCheck,
        vocabulary: &Vocabulary,
    ) -> StoreResult<CheckResult> {
        let query = match build_query(&check.kind, vocabulary) {
            Ok(query) => query,
            Err(e) => return Ok(result(check, false, format!("not runnable: {}", e))),
        };

        let rows = store.run_spot_check(&query).await?;
        let first = rows.first();
        let column = |name: &str| first.and_then(|row| row.get(name)).and_then(PropertyValue::as_i64);

        let outcome = match &check.kind {
            SpotCheckKind::NodeExists { node } => {
                let count = column("count").unwrap_or(0);
                result(check, count > 0, format!("{} matched {} node(s)", node.describe(), count))
            }
            SpotCheckKind::RelationshipExists { rel_type, from, to } => {
                let count = column("count").unwrap_or(0);
                result(
                    check,
                    count > 0,
                    format!("{}-[:{}]->{} matched {} relationship(s)", from.describe(), rel_type, to.describe(), count),
                )
            }
            SpotCheckKind::ChainDepth {
                rel_type,
                min_depth,
                max_depth,
                ..
            } => match column("depth") {
                Some(depth) => result(
                    check,
                    depth >= i64::from(*min_depth) && depth <= i64::from(*max_depth),
                    format!("longest {} chain is {} (expected {}..={})", rel_type, depth, min_depth, max_depth),
                ),
                None => result(check, false, format!("no {} chain found", rel_type)),
            },
        };
        Ok(outcome)
    }
}

fn result(check: &SpotCheck, passed: bool, detail: String) -> CheckResult {
    CheckResult {
        name: check.name.clone(),
        passed,
        detail,
    }
}

fn label_counts_check(spec: &VerificationSpec, report: &VerificationReport) -> CheckResult {
    let short: Vec<String> = spec
        .expected_minimums
        .iter()
        .filter_map(|(label, expected)| {
            let actual = report.node_counts.get(label).copied().unwrap_or(0);
            (actual < *expected).then(|| format!("{} has {} node(s), expected at least {}", label, actual, expected))
        })
        .collect();

    CheckResult {
        name: "label_counts".to_string(),
        passed: short.is_empty(),
        detail: if short.is_empty() {
            format!("{} label(s) at or above expected counts", spec.expected_minimums.len())
        } else {
            short.join("; ")
        },
    }
}

fn selector_match(selector: &EndpointSelector, vocabulary: &Vocabulary) -> Result<NodeMatch, ItemError> {
    let properties = selector
        .properties
        .iter()
        .map(|(k, v)| Ok((vocabulary.property(k)?, v.to_storable().unwrap_or(PropertyValue::Null))))
        .collect::<Result<Vec<_>, ItemError>>()?;
    Ok(NodeMatch {
        label: vocabulary.label(&selector.label)?,
        properties,
    })
}

fn build_query(kind: &SpotCheckKind, vocabulary: &Vocabulary) -> Result<SpotCheckQuery, ItemError> {
    Ok(match kind {
        SpotCheckKind::NodeExists { node } => SpotCheckQuery::NodeExists(selector_match(node, vocabulary)?),
        SpotCheckKind::RelationshipExists { rel_type, from, to } => SpotCheckQuery::RelationshipExists {
            rel_type: vocabulary.relationship_type(rel_type)?,
            from: selector_match(from, vocabulary)?,
            to: selector_match(to, vocabulary)?,
        },
        SpotCheckKind::ChainDepth {
            rel_type,
            label,
            root,
            max_depth,
            ..
        } => SpotCheckQuery::LongestChain {
            rel_type: vocabulary.relationship_type(rel_type)?,
            label: vocabulary.label(label)?,
            root: root.as_ref().map(|r| selector_match(r, vocabulary)).transpose()?,
            // One past the maximum so an over-deep chain is observable.
            limit: max_depth.saturating_add(1),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryGraphStore, NodeKey, NodeRef, NodeWrite, RelationshipKey, RelationshipWrite, WriteMode};
    use ontograph_core::{Ident, PropertyMap, SchemaModel};

    const CLASS_DOC: &str = r#"{
        "schema": {"constraints": [{"label": "OntologyClass", "property": "name"}]},
        "data": {
            "nodes": [
                {"label": "OntologyClass", "properties": {"name": "O_Object"}},
                {"label": "OntologyClass", "properties": {"name": "O_Event"}},
                {"label": "OntologyClass", "properties": {"name": "O_FlightEvent"}}
            ],
            "relationships": [
                {"type": "INHERITANCE", "from": {"label": "OntologyClass", "name": "O_Event"}, "to": {"label": "OntologyClass", "name": "O_Object"}}
            ]
        },
        "verification": {"checks": [
            {"name": "root exists", "kind": "node_exists", "node": {"label": "OntologyClass", "match": {"name": "O_Object"}}},
            {"name": "inheritance depth", "kind": "chain_depth", "type": "INHERITANCE", "label": "OntologyClass",
             "root": {"label": "OntologyClass", "match": {"name": "O_Object"}}, "min_depth": 2, "max_depth": 4},
            {"name": "bogus label", "kind": "node_exists", "node": {"label": "Nope", "match": {"name": "x"}}}
        ]}
    }"#;

    async fn class(store: &InMemoryGraphStore, name: &str) -> NodeRef {
        let mut props = PropertyMap::new();
        props.insert("name".into(), name.into());
        let write = NodeWrite {
            key: NodeKey {
                label: Ident::parse("OntologyClass").unwrap(),
                property: Ident::parse("name").unwrap(),
                value: name.into(),
            },
            labels: vec![Ident::parse("OntologyClass").unwrap()],
            properties: props,
        };
        store.upsert_node(&write, WriteMode::Replace).await.unwrap()
    }

    async fn inherit(store: &InMemoryGraphStore, from: NodeRef, to: NodeRef) {
        let write = RelationshipWrite {
            key: RelationshipKey {
                rel_type: Ident::parse("INHERITANCE").unwrap(),
                from,
                to,
                discriminator: None,
            },
            properties: PropertyMap::new(),
        };
        store.upsert_relationship(&write).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_reports_each_check() {
        let schema = SchemaModel::from_json_str(CLASS_DOC).unwrap();
        let spec = VerificationSpec::from_schema(&schema);
        let vocab = Vocabulary::from_schema(&schema);

        let store = InMemoryGraphStore::new();
        let root = class(&store, "O_Object").await;
        let event = class(&store, "O_Event").await;
        inherit(&store, event, root).await;

        let report = Verifier::new().verify(&store, &spec, &vocab).await.unwrap();
        assert_eq!(report.node_counts["OntologyClass"], 2);
        assert_eq!(report.relationship_counts["INHERITANCE"], 1);

        let by_name = |name: &str| report.checks.iter().find(|c| c.name == name).unwrap().clone();
        assert!(!by_name("label_counts").passed);
        assert!(by_name("root exists").passed);
        assert!(!by_name("inheritance depth").passed);
        assert!(by_name("bogus label").detail.starts_with("not runnable"));
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn test_verify_chain_depth_passes() {
        let schema = SchemaModel::from_json_str(CLASS_DOC).unwrap();
        let mut spec = VerificationSpec::from_schema(&schema);
        spec.checks.retain(|c| c.name == "inheritance depth");
        let vocab = Vocabulary::from_schema(&schema);

        let store = InMemoryGraphStore::new();
        let root = class(&store, "O_Object").await;
        let event = class(&store, "O_Event").await;
        let flight = class(&store, "O_FlightEvent").await;
        inherit(&store, event.clone(), root).await;
        inherit(&store, flight, event).await;

        let report = Verifier::new().verify(&store, &spec, &vocab).await.unwrap();
        assert!(report.passed(), "{:?}", report.checks);
    }

    #[tokio::test]
    async fn test_verify_transport_failure_propagates() {
        let schema = SchemaModel::from_json_str(CLASS_DOC).unwrap();
        let spec = VerificationSpec::from_schema(&schema);
        let vocab = Vocabulary::from_schema(&schema);
        let store = InMemoryGraphStore::new();
        store.set_unavailable(true).await;

        assert!(Verifier::new().verify(&store, &spec, &vocab).await.is_err());
    }
}
