//! Business-key resolution: which property uniquely identifies each label.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::ItemError;
use crate::schema::ConstraintSpec;

/// A constraint that replaced an earlier one for the same label.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyOverride {
    pub label: String,
    pub previous: String,
    pub current: String,
}

/// Mapping from label to its unique key property. Immutable once resolved.
#[derive(Debug, Clone, Default)]
pub struct UniqueKeyMap {
    keys: BTreeMap<String, String>,
    overrides: Vec<KeyOverride>,
}

impl UniqueKeyMap {
    /// Build the map from a constraint list.
    ///
    /// Later constraints for a label overwrite earlier ones. Each overwrite that
    /// changes the property is kept in [`UniqueKeyMap::overrides`] so the
    /// caller can surface it.
    pub fn resolve(constraints: &[ConstraintSpec]) -> Self {
        let mut keys: BTreeMap<String, String> = BTreeMap::new();
        let mut overrides = Vec::new();

        for constraint in constraints {
            if let Some(previous) = keys.insert(constraint.label.clone(), constraint.property.clone()) {
                if previous != constraint.property {
                    warn!(
                        label = %constraint.label,
                        previous = %previous,
                        current = %constraint.property,
                        "Multiple unique constraints for label, last one wins"
                    );
                    overrides.push(KeyOverride {
                        label: constraint.label.clone(),
                        previous,
                        current: constraint.property.clone(),
                    });
                }
            }
        }

        Self { keys, overrides }
    }

    /// Key property for a label.
    pub fn lookup(&self, label: &str) -> Result<&str, ItemError> {
        self.keys
            .get(label)
            .map(String::as_str)
            .ok_or_else(|| ItemError::MissingKeyDefinition {
                label: label.to_string(),
            })
    }

    pub fn overrides(&self) -> &[KeyOverride] {
        &self.overrides
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
