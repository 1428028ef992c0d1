//! # Ontograph Core
//!
//! Schema model, property values, business-key resolution and input decoding
//! for the ontograph reconciliation engine.

pub mod error;
pub mod ident;
pub mod keys;
pub mod property;
pub mod schema;
pub mod stats;
pub mod verify;

pub use error::{DecodeError, DecodeResult, ItemError};
pub use ident::{Ident, Vocabulary};
pub use keys::{KeyOverride, UniqueKeyMap};
pub use property::{PropertyMap, PropertyValue};
pub use schema::{
    load_source, ConstraintSpec, EndpointSelector, IndexSpec, NodeSpec, RelationshipKind,
    RelationshipSpec, SchemaMetadata, SchemaModel,
};
pub use stats::{ImportReport, ImportStats, ItemFailure};
pub use verify::{CheckResult, SpotCheck, SpotCheckKind, VerificationReport, VerificationSpec};
