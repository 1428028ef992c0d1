//! # Ontograph Graph
//!
//! Reconciles schema models into a property graph.
//!
//! Provides the [`GraphStore`] interface with Neo4j and in-memory
//! implementations, constraint/index provisioning, node and relationship
//! reconcilers, the import coordinator and the post-import verifier.

pub mod client;
pub mod cypher;
pub mod error;
pub mod import;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod verify;

pub use client::{normalize_uri, GraphClient, GraphConfig};
pub use error::{StoreError, StoreResult};
pub use import::{AbortCause, ImportAborted, ImportCoordinator, ImportOptions, ImportPhase};
pub use reconcile::{ReconcileError, ReconcileOutcome, ReconciliationPolicy, WritePolicy};
pub use schema::provision_schema;
pub use store::{GraphCounts, GraphStore, InMemoryGraphStore, WriteMode};
pub use verify::Verifier;
