//! The narrow store interface the reconcilers and verifier talk to.
//!
//! Everything that names a label, relationship type or property travels as an
//! [`Ident`], so implementations never splice unchecked text into a statement.

pub mod memory;
pub mod neo4j;

use std::fmt;

use async_trait::async_trait;
use ontograph_core::{Ident, PropertyMap, PropertyValue};
use serde::Serialize;

use crate::error::StoreResult;

pub use memory::InMemoryGraphStore;

/// Opaque handle to a stored node (Neo4j `elementId`, or the in-memory id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub String);

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a node: primary label plus business key.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeKey {
    pub label: Ident,
    pub property: Ident,
    pub value: PropertyValue,
}

/// Label plus property equality constraints, used for endpoint resolution
/// and spot checks.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMatch {
    pub label: Ident,
    pub properties: Vec<(Ident, PropertyValue)>,
}

impl From<NodeKey> for NodeMatch {
    fn from(key: NodeKey) -> Self {
        Self {
            label: key.label,
            properties: vec![(key.property, key.value)],
        }
    }
}

/// Full desired state of a node. `labels` starts with `key.label`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeWrite {
    pub key: NodeKey,
    pub labels: Vec<Ident>,
    pub properties: PropertyMap,
}

impl NodeWrite {
    /// Labels other than the primary one.
    pub fn extra_labels(&self) -> impl Iterator<Item = &Ident> {
        self.labels.iter().filter(move |l| **l != self.key.label)
    }
}

/// Discriminator property and the value that identifies one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
    pub property: Ident,
    pub value: PropertyValue,
}

/// Merge identity of a relationship: `(type, from, to[, discriminator])`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipKey {
    pub rel_type: Ident,
    pub from: NodeRef,
    pub to: NodeRef,
    pub discriminator: Option<Discriminator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipWrite {
    pub key: RelationshipKey,
    pub properties: PropertyMap,
}

/// How a node upsert treats properties already on the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// `SET n = $props`: fields absent from the input are removed.
    #[default]
    Replace,
    /// `SET n += $props`: fields absent from the input are kept.
    Patch,
}

/// Result of an idempotent provisioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

/// Structural queries the verifier can ask any store.
///
/// Rows carry a `count` column for the existence queries and a `depth`
/// column (null when no chain exists) for `LongestChain`.
#[derive(Debug, Clone, PartialEq)]
pub enum SpotCheckQuery {
    NodeExists(NodeMatch),
    RelationshipExists {
        rel_type: Ident,
        from: NodeMatch,
        to: NodeMatch,
    },
    /// Longest path of `rel_type` hops (at most `limit`) from any `label`
    /// node, ending at `root` when given.
    LongestChain {
        rel_type: Ident,
        label: Ident,
        root: Option<NodeMatch>,
        limit: u32,
    },
}

/// Node and relationship totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub nodes: i64,
    pub relationships: i64,
}

/// A persistent property graph.
///
/// Calls are independent: no transaction spans two calls.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Existence pre-check by business key.
    async fn find_node(&self, key: &NodeKey) -> StoreResult<Option<NodeRef>>;

    /// Every node matching the selector. Callers decide what several matches mean.
    async fn match_nodes(&self, selector: &NodeMatch) -> StoreResult<Vec<NodeRef>>;

    /// Match-or-create on the business key, then write properties per `mode`.
    async fn upsert_node(&self, node: &NodeWrite, mode: WriteMode) -> StoreResult<NodeRef>;

    /// Unconditional create.
    async fn create_node(&self, node: &NodeWrite) -> StoreResult<NodeRef>;

    async fn find_relationship(&self, key: &RelationshipKey) -> StoreResult<bool>;

    /// Match-or-create on the merge identity, then replace properties.
    async fn upsert_relationship(&self, rel: &RelationshipWrite) -> StoreResult<()>;

    async fn create_relationship(&self, rel: &RelationshipWrite) -> StoreResult<()>;

    async fn create_constraint(&self, name: &Ident, label: &Ident, property: &Ident) -> StoreResult<ProvisionOutcome>;

    async fn create_index(&self, name: &Ident, label: &Ident, property: &Ident) -> StoreResult<ProvisionOutcome>;

    async fn count_nodes(&self, label: &Ident) -> StoreResult<i64>;

    async fn count_relationships(&self, rel_type: &Ident) -> StoreResult<i64>;

    async fn totals(&self) -> StoreResult<GraphCounts>;

    async fn run_spot_check(&self, query: &SpotCheckQuery) -> StoreResult<Vec<PropertyMap>>;

    /// Delete every node and relationship.
    async fn clear_all(&self) -> StoreResult<()>;
}
