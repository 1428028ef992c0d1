//! Import coordinator: one run from schema model to verification report.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use ontograph_core::{ImportReport, ImportStats, SchemaModel, UniqueKeyMap, VerificationSpec, Vocabulary};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::StoreError;
use crate::reconcile::{
    NodeReconciler, ReconcileError, ReconcileOutcome, ReconciliationPolicy, RelationshipReconciler, WritePolicy,
};
use crate::schema::provision_schema;
use crate::store::GraphStore;
use crate::verify::Verifier;

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Idle,
    Clearing,
    ProvisioningSchema,
    ReconcilingNodes,
    ReconcilingRelationships,
    Verifying,
    Done,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Clearing => "clearing",
            Self::ProvisioningSchema => "schema provisioning",
            Self::ReconcilingNodes => "node reconciliation",
            Self::ReconcilingRelationships => "relationship reconciliation",
            Self::Verifying => "verification",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Delete everything in the store before provisioning.
    pub clear_first: bool,
    /// Stop after constraints and indexes.
    pub constraints_only: bool,
    pub policy: ReconciliationPolicy,
    pub write_policy: WritePolicy,
    pub cancel: CancellationToken,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            clear_first: false,
            constraints_only: false,
            policy: ReconciliationPolicy::Merge,
            write_policy: WritePolicy::default(),
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AbortCause {
    #[error(transparent)]
    Store(StoreError),

    #[error("cancelled")]
    Cancelled,
}

/// A run that stopped before `Done`, with everything counted so far.
#[derive(Error, Debug, Clone)]
#[error("Import aborted during {phase}: {cause}")]
pub struct ImportAborted {
    pub run_id: Uuid,
    pub phase: ImportPhase,
    pub stats: ImportStats,
    pub cause: AbortCause,
}

/// Drives one import run against a store.
pub struct ImportCoordinator {
    store: Arc<dyn GraphStore>,
    verifier: Verifier,
}

/// Mutable state of a run in progress.
struct Run {
    id: Uuid,
    phase: ImportPhase,
    stats: ImportStats,
}

impl Run {
    fn enter(&mut self, phase: ImportPhase) {
        info!(phase = %phase, "Entering phase");
        self.phase = phase;
    }

    fn abort(self, cause: AbortCause) -> ImportAborted {
        error!(phase = %self.phase, cause = %cause, "Import aborted");
        ImportAborted {
            run_id: self.id,
            phase: self.phase,
            stats: self.stats,
            cause,
        }
    }

    fn check_cancelled(&self, cancel: &CancellationToken) -> Result<(), AbortCause> {
        if cancel.is_cancelled() {
            return Err(AbortCause::Cancelled);
        }
        Ok(())
    }
}

impl ImportCoordinator {
    pub fn new(store: Arc<dyn GraphStore>, verifier: Verifier) -> Self {
        Self { store, verifier }
    }

    /// Run a full import.
    ///
    /// Item-level failures are recorded in the report and do not stop the
    /// run. Transport failures and cancellation return [`ImportAborted`].
    pub async fn run(&self, schema: SchemaModel, options: &ImportOptions) -> Result<ImportReport, ImportAborted> {
        let run_id = Uuid::new_v4();
        let span = info_span!("import", run_id = %run_id);
        self.run_inner(run_id, schema, options).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        mut schema: SchemaModel,
        options: &ImportOptions,
    ) -> Result<ImportReport, ImportAborted> {
        let started_at = Utc::now();
        let mut run = Run {
            id: run_id,
            phase: ImportPhase::Idle,
            stats: ImportStats::default(),
        };
        let store = self.store.as_ref();

        info!(
            version = %schema.version(),
            nodes = schema.nodes.len(),
            relationships = schema.relationships.len(),
            "Starting import"
        );

        for failure in std::mem::take(&mut schema.rejected) {
            warn!(item = %failure.item, error = %failure.error, "Record rejected by decoder");
            run.stats.errors.push(failure);
        }

        let keys = UniqueKeyMap::resolve(&schema.constraints);
        for o in keys.overrides() {
            run.stats.record_warning(format!(
                "Label {} has several unique constraints; using {} instead of {}",
                o.label, o.current, o.previous
            ));
        }
        let vocabulary = Vocabulary::from_schema(&schema);

        if options.clear_first {
            run.enter(ImportPhase::Clearing);
            if let Err(e) = store.clear_all().await {
                return Err(run.abort(AbortCause::Store(e)));
            }
            info!("Store cleared");
        }

        run.enter(ImportPhase::ProvisioningSchema);
        if let Err(e) = provision_schema(store, &schema, &mut run.stats).await {
            return Err(run.abort(AbortCause::Store(e)));
        }

        if options.constraints_only {
            run.enter(ImportPhase::Done);
            info!("Constraints-only run, skipping data");
            return Ok(ImportReport {
                run_id,
                started_at,
                finished_at: Utc::now(),
                stats: run.stats,
                verification: None,
            });
        }

        let verification_spec = VerificationSpec::from_schema(&schema);

        run.enter(ImportPhase::ReconcilingNodes);
        let nodes = NodeReconciler::new(store, &keys, &vocabulary, options.policy, &options.write_policy);
        for spec in std::mem::take(&mut schema.nodes) {
            if let Err(cause) = run.check_cancelled(&options.cancel) {
                return Err(run.abort(cause));
            }
            let item = spec.describe(spec.primary_label().and_then(|l| keys.lookup(l).ok()));
            match nodes.reconcile(spec).await {
                Ok(ReconcileOutcome::Created) => run.stats.nodes_created += 1,
                Ok(ReconcileOutcome::Updated) => run.stats.nodes_updated += 1,
                Err(ReconcileError::Item(e)) => {
                    warn!(item = %item, error = %e, "Node skipped");
                    run.stats.record_failure(item, e);
                }
                Err(ReconcileError::Transport(e)) => return Err(run.abort(AbortCause::Store(e))),
            }
        }
        info!(
            created = run.stats.nodes_created,
            updated = run.stats.nodes_updated,
            "Nodes reconciled"
        );

        run.enter(ImportPhase::ReconcilingRelationships);
        let relationships = RelationshipReconciler::new(store, &keys, &vocabulary, options.policy);
        for spec in std::mem::take(&mut schema.relationships) {
            if let Err(cause) = run.check_cancelled(&options.cancel) {
                return Err(run.abort(cause));
            }
            let item = spec.describe();
            match relationships.reconcile(spec).await {
                Ok(ReconcileOutcome::Created) => run.stats.relationships_created += 1,
                Ok(ReconcileOutcome::Updated) => run.stats.relationships_updated += 1,
                Err(ReconcileError::Item(e)) => {
                    warn!(item = %item, error = %e, "Relationship skipped");
                    run.stats.record_failure(item, e);
                }
                Err(ReconcileError::Transport(e)) => return Err(run.abort(AbortCause::Store(e))),
            }
        }
        info!(
            created = run.stats.relationships_created,
            updated = run.stats.relationships_updated,
            "Relationships reconciled"
        );

        run.enter(ImportPhase::Verifying);
        let verification = match self.verifier.verify(store, &verification_spec, &vocabulary).await {
            Ok(report) => report,
            Err(e) => return Err(run.abort(AbortCause::Store(e))),
        };

        run.enter(ImportPhase::Done);
        info!(
            nodes_created = run.stats.nodes_created,
            nodes_updated = run.stats.nodes_updated,
            relationships_created = run.stats.relationships_created,
            relationships_updated = run.stats.relationships_updated,
            errors = run.stats.errors.len(),
            verification_passed = verification.passed(),
            "Import complete"
        );

        Ok(ImportReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stats: run.stats,
            verification: Some(verification),
        })
    }
}
