//! Import statistics and the run report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ItemError;
use crate::verify::VerificationReport;

/// An item that could not be reconciled, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub error: ItemError,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, error: ItemError) -> Self {
        Self {
            item: item.into(),
            error,
        }
    }
}

/// Counters for one run. Only ever incremented while the run is in progress.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub constraints_created: usize,
    pub indexes_created: usize,
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub relationships_created: usize,
    pub relationships_updated: usize,
    pub errors: Vec<ItemFailure>,
    pub warnings: Vec<String>,
}

impl ImportStats {
    pub fn record_failure(&mut self, item: impl Into<String>, error: ItemError) {
        self.errors.push(ItemFailure::new(item, error));
    }

    pub fn record_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn nodes_total(&self) -> usize {
        self.nodes_created + self.nodes_updated
    }

    pub fn relationships_total(&self) -> usize {
        self.relationships_created + self.relationships_updated
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result value of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: ImportStats,
    /// `None` when verification was skipped (constraints-only runs).
    pub verification: Option<VerificationReport>,
}

impl ImportReport {
    /// True when every spot check passed (or verification was skipped).
    pub fn verification_passed(&self) -> bool {
        self.verification.as_ref().map_or(true, VerificationReport::passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_failure_json() {
        let failure = ItemFailure::new(
            "(:Event {eventId: E1})",
            ItemError::UndeclaredIdentifier {
                kind: "label".to_string(),
                name: "Gate".to_string(),
            },
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["item"], "(:Event {eventId: E1})");
        assert_eq!(json["error"]["error"], "undeclared_identifier");
        assert_eq!(json["error"]["kind"], "label");
        assert_eq!(json["error"]["name"], "Gate");
    }

    #[test]
    fn test_stats_json_lists_errors() {
        let mut stats = ImportStats::default();
        stats.nodes_created = 2;
        stats.record_failure("(:Flight {})", ItemError::parse("node has no labels"));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["nodes_created"], 2);
        assert_eq!(json["errors"][0]["error"]["error"], "parse");
        assert_eq!(json["errors"][0]["error"]["detail"], "node has no labels");
    }
}
