//! Relationship reconciliation.

use ontograph_core::property::storable_properties;
use ontograph_core::{EndpointSelector, ItemError, PropertyValue, RelationshipSpec, UniqueKeyMap, Vocabulary};
use tracing::debug;

use super::{ReconcileError, ReconcileOutcome, ReconciliationPolicy};
use crate::store::{Discriminator, GraphStore, NodeMatch, NodeRef, RelationshipKey, RelationshipWrite};

pub struct RelationshipReconciler<'a> {
    store: &'a dyn GraphStore,
    keys: &'a UniqueKeyMap,
    vocabulary: &'a Vocabulary,
    policy: ReconciliationPolicy,
}

impl<'a> RelationshipReconciler<'a> {
    pub fn new(
        store: &'a dyn GraphStore,
        keys: &'a UniqueKeyMap,
        vocabulary: &'a Vocabulary,
        policy: ReconciliationPolicy,
    ) -> Self {
        Self {
            store,
            keys,
            vocabulary,
            policy,
        }
    }

    /// Resolve both endpoints, then match-or-create on the merge identity.
    pub async fn reconcile(&self, spec: RelationshipSpec) -> Result<ReconcileOutcome, ReconcileError> {
        let rel_type = self.vocabulary.relationship_type(&spec.rel_type)?;

        let discriminator = match &spec.discriminator {
            Some(property) => Some(Discriminator {
                property: self.vocabulary.property(property)?,
                value: spec
                    .properties
                    .get(property)
                    .filter(|v| !v.is_blank())
                    .and_then(PropertyValue::to_storable)
                    .ok_or_else(|| ItemError::MissingDiscriminator {
                        rel_type: spec.rel_type.clone(),
                        property: property.clone(),
                    })?,
            }),
            None => None,
        };

        let from = self.resolve_endpoint(&spec.from).await?;
        let to = self.resolve_endpoint(&spec.to).await?;

        let write = RelationshipWrite {
            key: RelationshipKey {
                rel_type,
                from,
                to,
                discriminator,
            },
            properties: storable_properties(&spec.properties),
        };

        let existed = self.store.find_relationship(&write.key).await?;
        match self.policy {
            ReconciliationPolicy::Merge => self.store.upsert_relationship(&write).await?,
            ReconciliationPolicy::CreateOnly if existed => {
                return Err(ItemError::AlreadyExists { item: spec.describe() }.into());
            }
            ReconciliationPolicy::CreateOnly => self.store.create_relationship(&write).await?,
        }

        let outcome = if existed {
            ReconcileOutcome::Updated
        } else {
            ReconcileOutcome::Created
        };
        debug!(relationship = %spec.describe(), outcome = ?outcome, "Reconciled relationship");
        Ok(outcome)
    }

    /// Exactly one node must match; zero or several is an item error.
    async fn resolve_endpoint(&self, selector: &EndpointSelector) -> Result<NodeRef, ReconcileError> {
        self.keys.lookup(&selector.label)?;
        let label = self.vocabulary.label(&selector.label)?;

        let properties = selector
            .properties
            .iter()
            .map(|(k, v)| Ok((self.vocabulary.property(k)?, v.to_storable().unwrap_or(PropertyValue::Null))))
            .collect::<Result<Vec<_>, ItemError>>()?;
        if properties.is_empty() {
            return Err(ItemError::EndpointNotFound {
                selector: selector.describe(),
                matches: 0,
            }
            .into());
        }

        let mut matches = self.store.match_nodes(&NodeMatch { label, properties }).await?;
        if matches.len() != 1 {
            return Err(ItemError::EndpointNotFound {
                selector: selector.describe(),
                matches: matches.len(),
            }
            .into());
        }
        Ok(matches.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{NodeReconciler, WritePolicy};
    use crate::store::InMemoryGraphStore;
    use ontograph_core::{ConstraintSpec, NodeSpec, PropertyMap, SchemaModel};

    fn node(label: &str, key: &str, value: &str) -> NodeSpec {
        let mut props = PropertyMap::new();
        props.insert(key.into(), value.into());
        NodeSpec::new(vec![label.into()], props, "").unwrap()
    }

    fn triggers(action: Option<&str>, priority: i64) -> RelationshipSpec {
        let mut props = PropertyMap::new();
        if let Some(action) = action {
            props.insert("actionType".into(), action.into());
        }
        props.insert("priority".into(), priority.into());
        RelationshipSpec {
            rel_type: "TRIGGERS".into(),
            from: EndpointSelector::by_key("Event", "eventId", "EVT-1"),
            to: EndpointSelector::by_key("Flight", "flightId", "CA123"),
            properties: props,
            discriminator: Some("actionType".into()),
            version: String::new(),
        }
    }

    fn schema() -> SchemaModel {
        SchemaModel {
            constraints: vec![
                ConstraintSpec {
                    label: "Flight".into(),
                    property: "flightId".into(),
                    name: None,
                },
                ConstraintSpec {
                    label: "Event".into(),
                    property: "eventId".into(),
                    name: None,
                },
            ],
            nodes: vec![node("Flight", "flightId", "CA123"), node("Event", "eventId", "EVT-1")],
            relationships: vec![triggers(Some("NOTIFY"), 1)],
            ..Default::default()
        }
    }

    async fn seeded(schema: &SchemaModel) -> (InMemoryGraphStore, UniqueKeyMap, Vocabulary) {
        let store = InMemoryGraphStore::new();
        let keys = UniqueKeyMap::resolve(&schema.constraints);
        let vocab = Vocabulary::from_schema(schema);
        let policy = WritePolicy::default();
        let nodes = NodeReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge, &policy);
        for spec in schema.nodes.clone() {
            nodes.reconcile(spec).await.unwrap();
        }
        (store, keys, vocab)
    }

    #[tokio::test]
    async fn test_multi_instance_relationships() {
        let schema = schema();
        let (store, keys, vocab) = seeded(&schema).await;
        let reconciler = RelationshipReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge);

        assert_eq!(reconciler.reconcile(triggers(Some("NOTIFY"), 1)).await.unwrap(), ReconcileOutcome::Created);
        assert_eq!(reconciler.reconcile(triggers(Some("REBOOK"), 1)).await.unwrap(), ReconcileOutcome::Created);
        assert_eq!(reconciler.reconcile(triggers(Some("NOTIFY"), 2)).await.unwrap(), ReconcileOutcome::Updated);

        let rels = store.relationship_properties("TRIGGERS").await;
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0]["priority"], PropertyValue::Int(2));
    }

    #[tokio::test]
    async fn test_missing_discriminator_value() {
        let schema = schema();
        let (store, keys, vocab) = seeded(&schema).await;
        let reconciler = RelationshipReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge);

        let err = reconciler.reconcile(triggers(None, 1)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Item(ItemError::MissingDiscriminator { .. })));
        assert!(store.relationship_properties("TRIGGERS").await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_endpoint() {
        let schema = schema();
        let (store, keys, vocab) = seeded(&schema).await;
        let reconciler = RelationshipReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge);

        let mut spec = triggers(Some("NOTIFY"), 1);
        spec.to = EndpointSelector::by_key("Flight", "flightId", "ZZ999");
        let err = reconciler.reconcile(spec).await.unwrap_err();
        assert_eq!(
            err,
            ReconcileError::Item(ItemError::EndpointNotFound {
                selector: "(:Flight {flightId: ZZ999})".into(),
                matches: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_ambiguous_endpoint() {
        let mut schema = schema();
        let mut a = node("Flight", "flightId", "CA124");
        a.properties.insert("carrier".into(), "CA".into());
        let mut b = node("Flight", "flightId", "CA125");
        b.properties.insert("carrier".into(), "CA".into());
        schema.nodes.push(a);
        schema.nodes.push(b);
        let (store, keys, vocab) = seeded(&schema).await;
        let reconciler = RelationshipReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge);

        let mut spec = triggers(Some("NOTIFY"), 1);
        spec.to = EndpointSelector::by_key("Flight", "carrier", "CA");
        let err = reconciler.reconcile(spec).await.unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Item(ItemError::EndpointNotFound { matches: 2, .. })
        ));
        assert!(store.relationship_properties("TRIGGERS").await.is_empty());
    }

    #[tokio::test]
    async fn test_undeclared_relationship_type() {
        let schema = schema();
        let (store, keys, vocab) = seeded(&schema).await;
        let reconciler = RelationshipReconciler::new(&store, &keys, &vocab, ReconciliationPolicy::Merge);

        let mut spec = triggers(Some("NOTIFY"), 1);
        spec.rel_type = "DELETES".into();
        let err = reconciler.reconcile(spec).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Item(ItemError::UndeclaredIdentifier { .. })));
    }
}
