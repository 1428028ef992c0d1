//! [`GraphStore`] over Neo4j.

use async_trait::async_trait;
use ontograph_core::{Ident, PropertyMap, PropertyValue};
use tracing::debug;

use super::{
    GraphCounts, GraphStore, NodeKey, NodeMatch, NodeRef, NodeWrite, ProvisionOutcome, RelationshipKey,
    RelationshipWrite, SpotCheckQuery, WriteMode,
};
use crate::client::GraphClient;
use crate::cypher::{self, Statement};
use crate::error::{StoreError, StoreResult};

impl GraphClient {
    async fn count(&self, statement: Statement) -> StoreResult<i64> {
        Ok(self.query_scalar::<i64>(statement, "count").await?.unwrap_or(0))
    }

    async fn returned_id(&self, statement: Statement) -> StoreResult<NodeRef> {
        self.query_scalar::<String>(statement, "id")
            .await?
            .map(NodeRef)
            .ok_or_else(|| StoreError::rejected("write returned no node"))
    }

    async fn provision(&self, exists: Statement, create: Statement) -> StoreResult<ProvisionOutcome> {
        if self.count(exists).await? > 0 {
            return Ok(ProvisionOutcome::AlreadyExists);
        }
        self.execute(create).await?;
        Ok(ProvisionOutcome::Created)
    }
}

fn single_row(column: &str, value: PropertyValue) -> Vec<PropertyMap> {
    let mut row = PropertyMap::new();
    row.insert(column.to_string(), value);
    vec![row]
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn find_node(&self, key: &NodeKey) -> StoreResult<Option<NodeRef>> {
        Ok(self.query_scalar::<String>(cypher::find_node(key), "id").await?.map(NodeRef))
    }

    async fn match_nodes(&self, selector: &NodeMatch) -> StoreResult<Vec<NodeRef>> {
        let ids = self.query_column::<String>(cypher::match_nodes(selector), "id").await?;
        Ok(ids.into_iter().map(NodeRef).collect())
    }

    async fn upsert_node(&self, node: &NodeWrite, mode: WriteMode) -> StoreResult<NodeRef> {
        self.returned_id(cypher::upsert_node(node, mode)).await
    }

    async fn create_node(&self, node: &NodeWrite) -> StoreResult<NodeRef> {
        self.returned_id(cypher::create_node(node)).await
    }

    async fn find_relationship(&self, key: &RelationshipKey) -> StoreResult<bool> {
        Ok(self.count(cypher::find_relationship(key)).await? > 0)
    }

    async fn upsert_relationship(&self, rel: &RelationshipWrite) -> StoreResult<()> {
        self.execute(cypher::upsert_relationship(rel)).await
    }

    async fn create_relationship(&self, rel: &RelationshipWrite) -> StoreResult<()> {
        self.execute(cypher::create_relationship(rel)).await
    }

    async fn create_constraint(&self, name: &Ident, label: &Ident, property: &Ident) -> StoreResult<ProvisionOutcome> {
        self.provision(
            cypher::constraint_exists(name, label, property),
            cypher::create_constraint(name, label, property),
        )
        .await
    }

    async fn create_index(&self, name: &Ident, label: &Ident, property: &Ident) -> StoreResult<ProvisionOutcome> {
        self.provision(
            cypher::index_exists(name, label, property),
            cypher::create_index(name, label, property),
        )
        .await
    }

    async fn count_nodes(&self, label: &Ident) -> StoreResult<i64> {
        self.count(cypher::count_nodes(label)).await
    }

    async fn count_relationships(&self, rel_type: &Ident) -> StoreResult<i64> {
        self.count(cypher::count_relationships(rel_type)).await
    }

    async fn totals(&self) -> StoreResult<GraphCounts> {
        Ok(GraphCounts {
            nodes: self.count(cypher::count_all_nodes()).await?,
            relationships: self.count(cypher::count_all_relationships()).await?,
        })
    }

    async fn run_spot_check(&self, query: &SpotCheckQuery) -> StoreResult<Vec<PropertyMap>> {
        match query {
            SpotCheckQuery::NodeExists(selector) => {
                let count = self.count(cypher::node_exists(selector)).await?;
                Ok(single_row("count", PropertyValue::Int(count)))
            }
            SpotCheckQuery::RelationshipExists { rel_type, from, to } => {
                let count = self.count(cypher::relationship_exists(rel_type, from, to)).await?;
                Ok(single_row("count", PropertyValue::Int(count)))
            }
            SpotCheckQuery::LongestChain {
                rel_type,
                label,
                root,
                limit,
            } => {
                let statement = cypher::longest_chain(rel_type, label, root.as_ref(), *limit);
                let depth = self.query_scalar::<Option<i64>>(statement, "depth").await?.flatten();
                Ok(single_row("depth", depth.map_or(PropertyValue::Null, PropertyValue::Int)))
            }
        }
    }

    async fn clear_all(&self) -> StoreResult<()> {
        debug!("Deleting all nodes and relationships");
        self.execute(cypher::clear_all()).await
    }
}
