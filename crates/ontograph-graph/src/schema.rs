//! Constraint and index provisioning.

use ontograph_core::{Ident, ImportStats, ItemError, SchemaModel};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::{GraphStore, ProvisionOutcome};

#[derive(Debug, Clone, Copy)]
enum SchemaObject {
    Constraint,
    Index,
}

impl SchemaObject {
    fn as_str(self) -> &'static str {
        match self {
            Self::Constraint => "Constraint",
            Self::Index => "Index",
        }
    }
}

fn idents(name: &str, label: &str, property: &str) -> Result<(Ident, Ident, Ident), ItemError> {
    Ok((Ident::parse(name)?, Ident::parse(label)?, Ident::parse(property)?))
}

/// Create every declared constraint, then every index.
///
/// Safe to run multiple times: objects that already exist, conflict, or carry
/// an unusable name become warnings in `stats`. Only transport failures are
/// returned.
pub async fn provision_schema(store: &dyn GraphStore, schema: &SchemaModel, stats: &mut ImportStats) -> StoreResult<()> {
    info!(
        constraints = schema.constraints.len(),
        indexes = schema.indexes.len(),
        "Provisioning schema"
    );

    for c in &schema.constraints {
        let name = c.name();
        if provision_one(store, SchemaObject::Constraint, &name, &c.label, &c.property, stats).await? {
            stats.constraints_created += 1;
        }
    }
    for i in &schema.indexes {
        let name = i.name();
        if provision_one(store, SchemaObject::Index, &name, &i.label, &i.property, stats).await? {
            stats.indexes_created += 1;
        }
    }

    info!(
        constraints_created = stats.constraints_created,
        indexes_created = stats.indexes_created,
        "Schema provisioned"
    );
    Ok(())
}

/// Returns true when the object was created.
async fn provision_one(
    store: &dyn GraphStore,
    object: SchemaObject,
    name: &str,
    label: &str,
    property: &str,
    stats: &mut ImportStats,
) -> StoreResult<bool> {
    let (name_id, label_id, property_id) = match idents(name, label, property) {
        Ok(ids) => ids,
        Err(e) => {
            let warning = format!("{} {} skipped: {}", object.as_str(), name, e);
            warn!("{}", warning);
            stats.record_warning(warning);
            return Ok(false);
        }
    };

    let result = match object {
        SchemaObject::Constraint => store.create_constraint(&name_id, &label_id, &property_id).await,
        SchemaObject::Index => store.create_index(&name_id, &label_id, &property_id).await,
    };

    match result {
        Ok(ProvisionOutcome::Created) => {
            info!(name = %name, label = %label, property = %property, "{} created", object.as_str());
            Ok(true)
        }
        Ok(ProvisionOutcome::AlreadyExists) => {
            let warning = format!("{} {} on :{}({}) already exists", object.as_str(), name, label, property);
            warn!("{}", warning);
            stats.record_warning(warning);
            Ok(false)
        }
        Err(StoreError::Rejected(detail)) => {
            let warning = format!("{} {} could not be created: {}", object.as_str(), name, detail);
            warn!("{}", warning);
            stats.record_warning(warning);
            Ok(false)
        }
        Err(transport) => Err(transport),
    }
}
