//! Terminal output formatting.

use colored::Colorize;
use ontograph_core::{ImportReport, ImportStats, VerificationReport};
use ontograph_graph::ImportAborted;
use serde_json::json;

/// Item errors listed before the "... and N more" line.
const SHOWN_ERRORS: usize = 5;

fn print_stats(stats: &ImportStats) {
    println!("  Constraints created:   {}", stats.constraints_created);
    println!("  Indexes created:       {}", stats.indexes_created);
    println!(
        "  Nodes:                 {} created, {} updated",
        stats.nodes_created.to_string().green(),
        stats.nodes_updated.to_string().cyan()
    );
    println!(
        "  Relationships:         {} created, {} updated",
        stats.relationships_created.to_string().green(),
        stats.relationships_updated.to_string().cyan()
    );

    if !stats.warnings.is_empty() {
        println!("  Warnings:              {}", stats.warnings.len().to_string().yellow());
    }

    if stats.errors.is_empty() {
        println!("  Errors:                {}", "0".green());
        return;
    }

    println!("  Errors:                {}", stats.errors.len().to_string().red());
    for failure in stats.errors.iter().take(SHOWN_ERRORS) {
        println!("    {} {}: {}", "✗".red(), failure.item, failure.error);
    }
    if stats.errors.len() > SHOWN_ERRORS {
        println!(
            "    {}",
            format!("... and {} more", stats.errors.len() - SHOWN_ERRORS).dimmed()
        );
    }
}

fn print_verification(report: &VerificationReport) {
    println!();
    println!("{}", "Verification".bold());
    for (label, count) in &report.node_counts {
        println!("  {:<28} {}", format!(":{}", label), count);
    }
    for (rel_type, count) in &report.relationship_counts {
        println!("  {:<28} {}", format!("[:{}]", rel_type), count);
    }
    for check in &report.checks {
        let mark = if check.passed { "✓".green() } else { "✗".red() };
        println!("  {} {} {}", mark, check.name, format!("({})", check.detail).dimmed());
    }
}

/// Print the summary of a completed run.
pub fn print_report(report: &ImportReport, dry_run: bool) {
    let title = if dry_run { "Dry run complete" } else { "Import complete" };
    let title = if report.stats.has_errors() {
        format!("{} with {} item error(s)", title, report.stats.errors.len()).yellow().bold()
    } else {
        title.green().bold()
    };

    println!();
    println!("{}", title);
    println!("{}", "─".repeat(50));
    print_stats(&report.stats);

    match &report.verification {
        Some(verification) => print_verification(verification),
        None => println!("\n{}", "Verification skipped (constraints only).".dimmed()),
    }

    println!("{}", "─".repeat(50));
    let elapsed = report.finished_at - report.started_at;
    println!(
        "{}",
        format!("run {} in {} ms", report.run_id, elapsed.num_milliseconds()).dimmed()
    );
}

/// Print an aborted run, distinct from a run that completed with item errors.
pub fn print_aborted(aborted: &ImportAborted) {
    println!();
    println!("{} {}", "✗ Import aborted".red().bold(), format!("during {}", aborted.phase).red());
    println!("  {}", aborted.cause.to_string().red());
    println!("{}", "─".repeat(50));
    println!("{}", "Progress before abort:".dimmed());
    print_stats(&aborted.stats);
    println!("{}", "─".repeat(50));
}

/// JSON body for an aborted run.
pub fn aborted_json(aborted: &ImportAborted) -> serde_json::Value {
    json!({
        "run_id": aborted.run_id,
        "aborted": true,
        "phase": aborted.phase,
        "cause": aborted.cause.to_string(),
        "stats": aborted.stats,
    })
}
