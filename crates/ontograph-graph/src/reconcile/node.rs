//! Node reconciliation.

use ontograph_core::property::storable_properties;
use ontograph_core::{ItemError, NodeSpec, UniqueKeyMap, Vocabulary};
use tracing::debug;

use super::{ReconcileError, ReconcileOutcome, ReconciliationPolicy, WritePolicy};
use crate::store::{GraphStore, NodeKey, NodeWrite};

pub struct NodeReconciler<'a> {
    store: &'a dyn GraphStore,
    keys: &'a UniqueKeyMap,
    vocabulary: &'a Vocabulary,
    policy: ReconciliationPolicy,
    write_policy: &'a WritePolicy,
}

impl<'a> NodeReconciler<'a> {
    pub fn new(
        store: &'a dyn GraphStore,
        keys: &'a UniqueKeyMap,
        vocabulary: &'a Vocabulary,
        policy: ReconciliationPolicy,
        write_policy: &'a WritePolicy,
    ) -> Self {
        Self {
            store,
            keys,
            vocabulary,
            policy,
            write_policy,
        }
    }

    /// Bring the store in line with `spec`: one existence read, one write.
    pub async fn reconcile(&self, spec: NodeSpec) -> Result<ReconcileOutcome, ReconcileError> {
        let write = self.prepare(&spec)?;

        let existing = self.store.find_node(&write.key).await?;
        if existing.is_some() && self.policy == ReconciliationPolicy::CreateOnly {
            return Err(ItemError::AlreadyExists {
                item: spec.describe(Some(write.key.property.as_str())),
            }
            .into());
        }

        match self.policy {
            ReconciliationPolicy::Merge => {
                let mode = self.write_policy.mode_for(write.key.label.as_str());
                self.store.upsert_node(&write, mode).await?;
            }
            ReconciliationPolicy::CreateOnly => {
                self.store.create_node(&write).await?;
            }
        }

        let outcome = if existing.is_some() {
            ReconcileOutcome::Updated
        } else {
            ReconcileOutcome::Created
        };
        debug!(
            labels = %spec.label_string(),
            key = %write.key.value,
            outcome = ?outcome,
            "Reconciled node"
        );
        Ok(outcome)
    }

    fn prepare(&self, spec: &NodeSpec) -> Result<NodeWrite, ItemError> {
        let primary = spec
            .primary_label()
            .ok_or_else(|| ItemError::parse("node has no labels"))?;
        let key_property = self.keys.lookup(primary)?;

        let value = spec
            .properties
            .get(key_property)
            .filter(|v| !v.is_blank())
            .and_then(|v| v.to_storable())
            .ok_or_else(|| ItemError::MissingKeyValue {
                label: primary.to_string(),
                property: key_property.to_string(),
            })?;

        let labels = spec
            .labels
            .iter()
            .map(|l| self.vocabulary.label(l))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NodeWrite {
            key: NodeKey {
                label: labels[0].clone(),
                property: self.vocabulary.property(key_property)?,
                value,
            },
            labels,
            properties: storable_properties(&spec.properties),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryGraphStore, WriteMode};
    use ontograph_core::{ConstraintSpec, PropertyMap, PropertyValue, SchemaModel};

    fn flight(id: &str, status: &str) -> NodeSpec {
        let mut props = PropertyMap::new();
        props.insert("flightId".into(), id.into());
        props.insert("status".into(), status.into());
        NodeSpec::new(vec!["Flight".into()], props, "Flight0.4").unwrap()
    }

    fn fixture(nodes: Vec<NodeSpec>) -> (UniqueKeyMap, Vocabulary) {
        let schema = SchemaModel {
            constraints: vec![ConstraintSpec {
                label: "Flight".into(),
                property: "flightId".into(),
                name: None,
            }],
            nodes,
            ..Default::default()
        };
        (UniqueKeyMap::resolve(&schema.constraints), Vocabulary::from_schema(&schema))
    }

    #[tokio::test]
    async fn test_created_then_updated() {
        let store = InMemoryGraphStore::new();
        let (keys, vocab) = fixture(vec![flight("CA123", "Delayed")]);
        let policy = WritePolicy::default();
        let reconciler = NodeReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge, &policy);

        assert_eq!(reconciler.reconcile(flight("CA123", "Delayed")).await.unwrap(), ReconcileOutcome::Created);
        assert_eq!(reconciler.reconcile(flight("CA123", "OnTime")).await.unwrap(), ReconcileOutcome::Updated);

        let props = store.node_properties("Flight", "flightId", &"CA123".into()).await.unwrap();
        assert_eq!(props["status"], PropertyValue::from("OnTime"));
    }

    #[tokio::test]
    async fn test_missing_key_value() {
        let store = InMemoryGraphStore::new();
        let (keys, vocab) = fixture(vec![flight("", "Delayed")]);
        let policy = WritePolicy::default();
        let reconciler = NodeReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge, &policy);

        let err = reconciler.reconcile(flight("  ", "Delayed")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Item(ItemError::MissingKeyValue { .. })));
    }

    #[tokio::test]
    async fn test_missing_key_definition() {
        let store = InMemoryGraphStore::new();
        let gate = NodeSpec::new(vec!["Gate".into()], PropertyMap::new(), "").unwrap();
        let (keys, vocab) = fixture(vec![gate.clone()]);
        let policy = WritePolicy::default();
        let reconciler = NodeReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge, &policy);

        let err = reconciler.reconcile(gate).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Item(ItemError::MissingKeyDefinition { .. })));
    }

    #[tokio::test]
    async fn test_create_only_rejects_existing() {
        let store = InMemoryGraphStore::new();
        let (keys, vocab) = fixture(vec![flight("CA123", "Delayed")]);
        let policy = WritePolicy::default();
        let reconciler = NodeReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::CreateOnly, &policy);

        reconciler.reconcile(flight("CA123", "Delayed")).await.unwrap();
        let err = reconciler.reconcile(flight("CA123", "OnTime")).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Item(ItemError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_patch_mode_keeps_absent_fields() {
        let store = InMemoryGraphStore::new();
        let (keys, vocab) = fixture(vec![flight("CA123", "Delayed")]);
        let policy = WritePolicy::default().with_label("Flight", WriteMode::Patch);
        let reconciler = NodeReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge, &policy);

        let mut first = flight("CA123", "Delayed");
        first.properties.insert("gate".into(), "B12".into());
        reconciler.reconcile(first).await.unwrap();
        reconciler.reconcile(flight("CA123", "OnTime")).await.unwrap();

        let props = store.node_properties("Flight", "flightId", &"CA123".into()).await.unwrap();
        assert_eq!(props["gate"], PropertyValue::from("B12"));
        assert_eq!(props["status"], PropertyValue::from("OnTime"));
    }
}
