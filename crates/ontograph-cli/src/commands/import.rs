//! Import command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;
use ontograph_core::{load_source, SchemaModel};
use ontograph_graph::{
    GraphClient, GraphStore, ImportCoordinator, ImportOptions, InMemoryGraphStore, ReconciliationPolicy, Verifier,
    WriteMode, WritePolicy,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::ConnectionArgs;
use crate::output;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Schema document (.json) or directory of nodes*.csv / rels*.csv files
    #[arg(long, env = "ONTOGRAPH_SOURCE")]
    pub source: Option<PathBuf>,

    /// Delete all existing nodes and relationships first
    #[arg(long)]
    pub clear: bool,

    /// Do not ask before clearing
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Only create constraints and indexes
    #[arg(long)]
    pub constraints_only: bool,

    /// Run against an in-memory graph instead of Neo4j
    #[arg(long)]
    pub dry_run: bool,

    /// Report existing entities as errors instead of updating them
    #[arg(long)]
    pub create_only: bool,

    /// Merge properties into existing nodes of this label instead of replacing them
    #[arg(long = "patch-label", value_name = "LABEL")]
    pub patch_labels: Vec<String>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ImportArgs {
    fn options(&self, clear_first: bool, cancel: CancellationToken) -> ImportOptions {
        let write_policy = self
            .patch_labels
            .iter()
            .fold(WritePolicy::default(), |policy, label| policy.with_label(label.clone(), WriteMode::Patch));

        ImportOptions {
            clear_first,
            constraints_only: self.constraints_only,
            policy: if self.create_only {
                ReconciliationPolicy::CreateOnly
            } else {
                ReconciliationPolicy::Merge
            },
            write_policy,
            cancel,
        }
    }
}

/// Ask before wiping the store. A declined prompt imports without clearing.
fn confirm_clear(args: &ImportArgs) -> Result<bool> {
    if !args.clear {
        return Ok(false);
    }
    if args.yes || args.dry_run {
        return Ok(true);
    }

    let confirmed = Confirm::new()
        .with_prompt("This deletes every node and relationship in the database. Continue?")
        .default(false)
        .interact()
        .context("Failed to read confirmation (use --yes in non-interactive sessions)")?;
    if !confirmed {
        println!("{}", "Keeping existing data.".yellow());
    }
    Ok(confirmed)
}

pub async fn execute(args: ImportArgs, connection: &ConnectionArgs) -> Result<i32> {
    let source = args
        .source
        .clone()
        .context("No import source given (use --source or ONTOGRAPH_SOURCE)")?;
    let schema: SchemaModel =
        load_source(&source).with_context(|| format!("Failed to load {}", source.display()))?;
    info!(
        source = %source.display(),
        nodes = schema.nodes.len(),
        relationships = schema.relationships.len(),
        rejected = schema.rejected.len(),
        "Loaded import source"
    );

    let clear_first = confirm_clear(&args)?;

    let store: Arc<dyn GraphStore> = if args.dry_run {
        info!("Dry run: using an in-memory graph");
        Arc::new(InMemoryGraphStore::new())
    } else {
        let config = connection.config();
        Arc::new(GraphClient::connect(&config).await?)
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current item");
            on_interrupt.cancel();
        }
    });

    let options = args.options(clear_first, cancel);
    let coordinator = ImportCoordinator::new(store, Verifier::new());

    match coordinator.run(schema, &options).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_report(&report, args.dry_run);
            }
            Ok(0)
        }
        Err(aborted) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&output::aborted_json(&aborted))?);
            } else {
                output::print_aborted(&aborted);
            }
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ImportArgs,
    }

    #[test]
    fn test_import_flags() {
        let harness = Harness::parse_from([
            "ontograph",
            "--source",
            "flight.json",
            "--create-only",
            "--patch-label",
            "Flight",
            "--patch-label",
            "Gate",
        ]);
        let options = harness.args.options(false, CancellationToken::new());
        assert_eq!(options.policy, ReconciliationPolicy::CreateOnly);
        assert_eq!(options.write_policy.mode_for("Flight"), WriteMode::Patch);
        assert_eq!(options.write_policy.mode_for("Gate"), WriteMode::Patch);
        assert_eq!(options.write_policy.mode_for("Event"), WriteMode::Replace);
        assert!(!options.constraints_only);
    }

    #[test]
    fn test_clear_needs_flag() {
        let harness = Harness::parse_from(["ontograph", "--source", "x.json"]);
        assert!(!confirm_clear(&harness.args).unwrap());

        let harness = Harness::parse_from(["ontograph", "--source", "x.json", "--clear", "--yes"]);
        assert!(confirm_clear(&harness.args).unwrap());
    }
}
