//! Neo4j connection client.

use anyhow::{Context, Result};
use neo4rs::{ConfigBuilder, Graph, Query, Row};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::cypher::Statement;
use crate::error::StoreResult;

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
        }
    }
}

impl GraphConfig {
    /// Defaults overridden by `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD`
    /// and `NEO4J_DATABASE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, fallback: String| std::env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or(fallback);
        Self {
            uri: normalize_uri(&var("NEO4J_URI", defaults.uri)),
            user: var("NEO4J_USER", defaults.user),
            password: var("NEO4J_PASSWORD", defaults.password),
            database: var("NEO4J_DATABASE", defaults.database),
        }
    }
}

/// Rewrite a browser URL (`http://host:7474`) to the bolt endpoint of the
/// same host (`bolt://host:7687`). Other URIs pass through unchanged.
pub fn normalize_uri(uri: &str) -> String {
    let rest = match uri.strip_prefix("http://").or_else(|| uri.strip_prefix("https://")) {
        Some(rest) => rest,
        None => return uri.to_string(),
    };
    let authority = rest.split('/').next().unwrap_or(rest);
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    };
    format!("bolt://{}:7687", host)
}

/// Client for Neo4j graph operations.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Create a new GraphClient from config.
    ///
    /// `Graph::connect` only builds the pool; the `RETURN 1` ping forces a
    /// real bolt handshake so an unreachable server fails here.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(4)
            .fetch_size(200)
            .build()
            .context("Failed to build Neo4j config")?;

        let graph = Graph::connect(neo4j_config)
            .await
            .context("Failed to create Neo4j connection pool")?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .with_context(|| format!("Neo4j at {} is not responding to queries", config.uri))?;

        Ok(Self { graph })
    }

    /// Execute a statement that returns no results.
    pub async fn execute(&self, statement: Statement) -> StoreResult<()> {
        debug!(cypher = statement.text(), "execute");
        self.graph.run(statement.into_query()).await?;
        Ok(())
    }

    /// Execute a statement and collect its rows.
    pub async fn query(&self, statement: Statement) -> StoreResult<Vec<Row>> {
        debug!(cypher = statement.text(), "query");
        let mut result = self.graph.execute(statement.into_query()).await?;

        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a statement and read `field` from the first row.
    pub async fn query_scalar<T: DeserializeOwned>(&self, statement: Statement, field: &str) -> StoreResult<Option<T>> {
        let rows = self.query(statement).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.get::<T>(field)?)),
            None => Ok(None),
        }
    }

    /// `field` from every row.
    pub async fn query_column<T: DeserializeOwned>(&self, statement: Statement, field: &str) -> StoreResult<Vec<T>> {
        let rows = self.query(statement).await?;
        rows.into_iter()
            .map(|row| row.get::<T>(field).map_err(Into::into))
            .collect()
    }
}
