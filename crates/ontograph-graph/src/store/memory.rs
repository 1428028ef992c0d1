//! In-memory property graph used by tests and `--dry-run`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use ontograph_core::{Ident, PropertyMap, PropertyValue};
use tokio::sync::RwLock;

use super::{
    GraphCounts, GraphStore, NodeKey, NodeMatch, NodeRef, NodeWrite, ProvisionOutcome, RelationshipKey,
    RelationshipWrite, SpotCheckQuery, WriteMode,
};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct MemoryNode {
    labels: BTreeSet<String>,
    properties: PropertyMap,
}

impl MemoryNode {
    fn matches(&self, selector: &NodeMatch) -> bool {
        self.labels.contains(selector.label.as_str())
            && selector
                .properties
                .iter()
                .all(|(k, v)| self.properties.get(k.as_str()) == Some(v))
    }
}

#[derive(Debug, Clone)]
struct MemoryRelationship {
    rel_type: String,
    from: u64,
    to: u64,
    properties: PropertyMap,
}

#[derive(Debug, Default)]
struct MemoryGraph {
    next_id: u64,
    nodes: BTreeMap<u64, MemoryNode>,
    relationships: Vec<MemoryRelationship>,
    /// name → (label, property)
    constraints: BTreeMap<String, (String, String)>,
    indexes: BTreeMap<String, (String, String)>,
    unavailable: bool,
    writes_before_failure: Option<usize>,
}

impl MemoryGraph {
    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable {
            return Err(StoreError::transport("in-memory store marked unavailable"));
        }
        Ok(())
    }

    /// Counts down the write budget set by `fail_writes_after`.
    fn begin_write(&mut self) -> StoreResult<()> {
        self.check_available()?;
        if let Some(remaining) = self.writes_before_failure.as_mut() {
            if *remaining == 0 {
                self.unavailable = true;
                return Err(StoreError::transport("connection lost"));
            }
            *remaining -= 1;
        }
        Ok(())
    }

    fn find(&self, selector: &NodeMatch) -> Vec<u64> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.matches(selector))
            .map(|(id, _)| *id)
            .collect()
    }

    fn resolve(&self, node: &NodeRef) -> StoreResult<u64> {
        node.0
            .parse::<u64>()
            .ok()
            .filter(|id| self.nodes.contains_key(id))
            .ok_or_else(|| StoreError::rejected(format!("no node with id {}", node)))
    }

    /// Unique-constraint check for a candidate node state.
    fn validate(&self, id: Option<u64>, candidate: &MemoryNode) -> StoreResult<()> {
        for (label, property) in self.constraints.values() {
            if !candidate.labels.contains(label) {
                continue;
            }
            let Some(value) = candidate.properties.get(property) else {
                continue;
            };
            let clash = self.nodes.iter().any(|(other_id, other)| {
                Some(*other_id) != id && other.labels.contains(label) && other.properties.get(property) == Some(value)
            });
            if clash {
                return Err(StoreError::rejected(format!(
                    "Node already exists with label `{}` and property `{}` = {}",
                    label, property, value
                )));
            }
        }
        Ok(())
    }

    fn insert_node(&mut self, node: MemoryNode) -> NodeRef {
        self.next_id += 1;
        let id = self.next_id;
        self.nodes.insert(id, node);
        NodeRef(id.to_string())
    }

    fn find_relationship(&self, key: &RelationshipKey) -> StoreResult<Option<usize>> {
        let from = self.resolve(&key.from)?;
        let to = self.resolve(&key.to)?;
        Ok(self.relationships.iter().position(|r| {
            r.rel_type == key.rel_type.as_str()
                && r.from == from
                && r.to == to
                && key
                    .discriminator
                    .as_ref()
                    .map_or(true, |d| r.properties.get(d.property.as_str()) == Some(&d.value))
        }))
    }

    fn count_matching_relationships(&self, rel_type: &str, from: &NodeMatch, to: &NodeMatch) -> i64 {
        self.relationships
            .iter()
            .filter(|r| {
                r.rel_type == rel_type
                    && self.nodes.get(&r.from).is_some_and(|n| n.matches(from))
                    && self.nodes.get(&r.to).is_some_and(|n| n.matches(to))
            })
            .count() as i64
    }

    /// Longest path of `rel_type` hops, without reusing a relationship,
    /// from any `label` node; `None` when no path qualifies.
    fn longest_chain(&self, rel_type: &str, label: &str, root: Option<&NodeMatch>, limit: u32) -> Option<i64> {
        let edges: Vec<(usize, &MemoryRelationship)> = self
            .relationships
            .iter()
            .enumerate()
            .filter(|(_, r)| r.rel_type == rel_type)
            .collect();

        let mut best = None;
        for (id, node) in &self.nodes {
            if !node.labels.contains(label) {
                continue;
            }
            let mut used = BTreeSet::new();
            self.walk(*id, 0, limit.max(1), &edges, root, &mut used, &mut best);
        }
        best
    }

    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        at: u64,
        depth: u32,
        limit: u32,
        edges: &[(usize, &MemoryRelationship)],
        root: Option<&NodeMatch>,
        used: &mut BTreeSet<usize>,
        best: &mut Option<i64>,
    ) {
        if depth > 0 {
            let ends_ok = match root {
                Some(root) => self.nodes.get(&at).is_some_and(|n| n.matches(root)),
                None => true,
            };
            if ends_ok && best.map_or(true, |b| i64::from(depth) > b) {
                *best = Some(i64::from(depth));
            }
        }
        if depth == limit {
            return;
        }
        for (index, rel) in edges {
            if rel.from == at && !used.contains(index) {
                used.insert(*index);
                self.walk(rel.to, depth + 1, limit, edges, root, used, best);
                used.remove(index);
            }
        }
    }
}

/// Shared-state in-memory graph. Clones see the same graph.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    inner: Arc<RwLock<MemoryGraph>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with a transport error.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.unavailable = unavailable;
    }

    /// Allow `writes` more node/relationship writes, then fail with a
    /// transport error.
    pub async fn fail_writes_after(&self, writes: usize) {
        self.inner.write().await.writes_before_failure = Some(writes);
    }

    /// Properties of the node carrying `label` whose `property` equals `value`.
    pub async fn node_properties(&self, label: &str, property: &str, value: &PropertyValue) -> Option<PropertyMap> {
        let graph = self.inner.read().await;
        graph
            .nodes
            .values()
            .find(|n| n.labels.contains(label) && n.properties.get(property) == Some(value))
            .map(|n| n.properties.clone())
    }

    /// Labels of the node carrying `label` whose `property` equals `value`.
    pub async fn node_labels(&self, label: &str, property: &str, value: &PropertyValue) -> Option<Vec<String>> {
        let graph = self.inner.read().await;
        graph
            .nodes
            .values()
            .find(|n| n.labels.contains(label) && n.properties.get(property) == Some(value))
            .map(|n| n.labels.iter().cloned().collect())
    }

    /// Properties of every relationship of `rel_type`, in creation order.
    pub async fn relationship_properties(&self, rel_type: &str) -> Vec<PropertyMap> {
        let graph = self.inner.read().await;
        graph
            .relationships
            .iter()
            .filter(|r| r.rel_type == rel_type)
            .map(|r| r.properties.clone())
            .collect()
    }

    pub async fn constraint_names(&self) -> Vec<String> {
        self.inner.read().await.constraints.keys().cloned().collect()
    }

    pub async fn index_names(&self) -> Vec<String> {
        self.inner.read().await.indexes.keys().cloned().collect()
    }
}

fn count_row(count: i64) -> Vec<PropertyMap> {
    let mut row = PropertyMap::new();
    row.insert("count".to_string(), PropertyValue::Int(count));
    vec![row]
}

fn provision(
    registry: &mut BTreeMap<String, (String, String)>,
    name: &Ident,
    label: &Ident,
    property: &Ident,
) -> ProvisionOutcome {
    let target = (label.to_string(), property.to_string());
    if registry.contains_key(name.as_str()) || registry.values().any(|t| *t == target) {
        return ProvisionOutcome::AlreadyExists;
    }
    registry.insert(name.to_string(), target);
    ProvisionOutcome::Created
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn find_node(&self, key: &NodeKey) -> StoreResult<Option<NodeRef>> {
        let graph = self.inner.read().await;
        graph.check_available()?;
        let selector = NodeMatch::from(key.clone());
        Ok(graph.find(&selector).first().map(|id| NodeRef(id.to_string())))
    }

    async fn match_nodes(&self, selector: &NodeMatch) -> StoreResult<Vec<NodeRef>> {
        let graph = self.inner.read().await;
        graph.check_available()?;
        Ok(graph.find(selector).into_iter().map(|id| NodeRef(id.to_string())).collect())
    }

    async fn upsert_node(&self, node: &NodeWrite, mode: WriteMode) -> StoreResult<NodeRef> {
        let mut graph = self.inner.write().await;
        graph.begin_write()?;

        let existing = graph.find(&NodeMatch::from(node.key.clone())).first().copied();
        let mut candidate = match existing.and_then(|id| graph.nodes.get(&id)) {
            Some(current) => current.clone(),
            None => MemoryNode {
                labels: BTreeSet::new(),
                properties: PropertyMap::new(),
            },
        };
        candidate.labels.extend(node.labels.iter().map(|l| l.to_string()));
        match mode {
            WriteMode::Replace => candidate.properties = node.properties.clone(),
            WriteMode::Patch => candidate.properties.extend(node.properties.clone()),
        }
        // MERGE keeps the key property even if the property map omits it.
        candidate
            .properties
            .entry(node.key.property.to_string())
            .or_insert_with(|| node.key.value.clone());

        graph.validate(existing, &candidate)?;
        match existing {
            Some(id) => {
                graph.nodes.insert(id, candidate);
                Ok(NodeRef(id.to_string()))
            }
            None => Ok(graph.insert_node(candidate)),
        }
    }

    async fn create_node(&self, node: &NodeWrite) -> StoreResult<NodeRef> {
        let mut graph = self.inner.write().await;
        graph.begin_write()?;
        let candidate = MemoryNode {
            labels: node.labels.iter().map(|l| l.to_string()).collect(),
            properties: node.properties.clone(),
        };
        graph.validate(None, &candidate)?;
        Ok(graph.insert_node(candidate))
    }

    async fn find_relationship(&self, key: &RelationshipKey) -> StoreResult<bool> {
        let graph = self.inner.read().await;
        graph.check_available()?;
        Ok(graph.find_relationship(key)?.is_some())
    }

    async fn upsert_relationship(&self, rel: &RelationshipWrite) -> StoreResult<()> {
        let mut graph = self.inner.write().await;
        graph.begin_write()?;

        let mut properties = rel.properties.clone();
        if let Some(d) = &rel.key.discriminator {
            properties
                .entry(d.property.to_string())
                .or_insert_with(|| d.value.clone());
        }

        match graph.find_relationship(&rel.key)? {
            Some(index) => graph.relationships[index].properties = properties,
            None => {
                let from = graph.resolve(&rel.key.from)?;
                let to = graph.resolve(&rel.key.to)?;
                graph.relationships.push(MemoryRelationship {
                    rel_type: rel.key.rel_type.to_string(),
                    from,
                    to,
                    properties,
                });
            }
        }
        Ok(())
    }

    async fn create_relationship(&self, rel: &RelationshipWrite) -> StoreResult<()> {
        let mut graph = self.inner.write().await;
        graph.begin_write()?;
        let from = graph.resolve(&rel.key.from)?;
        let to = graph.resolve(&rel.key.to)?;
        graph.relationships.push(MemoryRelationship {
            rel_type: rel.key.rel_type.to_string(),
            from,
            to,
            properties: rel.properties.clone(),
        });
        Ok(())
    }

    async fn create_constraint(&self, name: &Ident, label: &Ident, property: &Ident) -> StoreResult<ProvisionOutcome> {
        let mut graph = self.inner.write().await;
        graph.check_available()?;

        let mut seen = BTreeSet::new();
        let violated = graph
            .nodes
            .values()
            .filter(|n| n.labels.contains(label.as_str()))
            .filter_map(|n| n.properties.get(property.as_str()))
            .any(|v| !seen.insert(v.to_string()));
        if violated {
            return Err(StoreError::rejected(format!(
                "existing `{}` nodes share a `{}` value",
                label, property
            )));
        }

        Ok(provision(&mut graph.constraints, name, label, property))
    }

    async fn create_index(&self, name: &Ident, label: &Ident, property: &Ident) -> StoreResult<ProvisionOutcome> {
        let mut graph = self.inner.write().await;
        graph.check_available()?;
        Ok(provision(&mut graph.indexes, name, label, property))
    }

    async fn count_nodes(&self, label: &Ident) -> StoreResult<i64> {
        let graph = self.inner.read().await;
        graph.check_available()?;
        Ok(graph.nodes.values().filter(|n| n.labels.contains(label.as_str())).count() as i64)
    }

    async fn count_relationships(&self, rel_type: &Ident) -> StoreResult<i64> {
        let graph = self.inner.read().await;
        graph.check_available()?;
        Ok(graph
            .relationships
            .iter()
            .filter(|r| r.rel_type == rel_type.as_str())
            .count() as i64)
    }

    async fn totals(&self) -> StoreResult<GraphCounts> {
        let graph = self.inner.read().await;
        graph.check_available()?;
        Ok(GraphCounts {
            nodes: graph.nodes.len() as i64,
            relationships: graph.relationships.len() as i64,
        })
    }

    async fn run_spot_check(&self, query: &SpotCheckQuery) -> StoreResult<Vec<PropertyMap>> {
        let graph = self.inner.read().await;
        graph.check_available()?;

        let rows = match query {
            SpotCheckQuery::NodeExists(selector) => count_row(graph.find(selector).len() as i64),
            SpotCheckQuery::RelationshipExists { rel_type, from, to } => {
                count_row(graph.count_matching_relationships(rel_type.as_str(), from, to))
            }
            SpotCheckQuery::LongestChain {
                rel_type,
                label,
                root,
                limit,
            } => {
                let depth = graph.longest_chain(rel_type.as_str(), label.as_str(), root.as_ref(), *limit);
                let mut row = PropertyMap::new();
                row.insert(
                    "depth".to_string(),
                    depth.map_or(PropertyValue::Null, PropertyValue::Int),
                );
                vec![row]
            }
        };
        Ok(rows)
    }

    async fn clear_all(&self) -> StoreResult<()> {
        let mut graph = self.inner.write().await;
        graph.check_available()?;
        graph.nodes.clear();
        graph.relationships.clear();
        Ok(())
    }
}
