//! Node and relationship reconcilers.
//!
//! A reconciler turns one desired-state spec into a pre-check plus an
//! idempotent write, and classifies the result as created or updated.

pub mod node;
pub mod relationship;

use std::collections::BTreeMap;

use ontograph_core::ItemError;
use serde::Serialize;
use thiserror::Error;

use crate::error::StoreError;
use crate::store::WriteMode;

pub use node::NodeReconciler;
pub use relationship::RelationshipReconciler;

/// What a reconciler does when the entity already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationPolicy {
    /// Match-or-create, then overwrite.
    #[default]
    Merge,
    /// Create only; an existing entity is an item error.
    CreateOnly,
}

/// Per-label node write mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePolicy {
    default: WriteMode,
    by_label: BTreeMap<String, WriteMode>,
}

impl WritePolicy {
    pub fn new(default: WriteMode) -> Self {
        Self {
            default,
            by_label: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>, mode: WriteMode) -> Self {
        self.by_label.insert(label.into(), mode);
        self
    }

    /// Write mode for a node whose primary label is `label`.
    pub fn mode_for(&self, label: &str) -> WriteMode {
        self.by_label.get(label).copied().unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Created,
    Updated,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    /// Only this item failed.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// The store is unreachable; the run cannot continue.
    #[error(transparent)]
    Transport(StoreError),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(detail) => Self::Item(ItemError::Rejected { detail }),
            transport => Self::Transport(transport),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_policy_per_label() {
        let policy = WritePolicy::default().with_label("Flight", WriteMode::Patch);
        assert_eq!(policy.mode_for("Flight"), WriteMode::Patch);
        assert_eq!(policy.mode_for("Gate"), WriteMode::Replace);
    }

    #[test]
    fn test_store_error_classification() {
        let item: ReconcileError = StoreError::rejected("constraint").into();
        assert!(matches!(item, ReconcileError::Item(ItemError::Rejected { .. })));

        let fatal: ReconcileError = StoreError::transport("reset").into();
        assert!(matches!(fatal, ReconcileError::Transport(_)));
    }
}
