//! Status command implementation

use anyhow::{Context, Result};
use std::collections::HashSet;
use tm_ledger::MigrationStatus;

use crate::cli::{GlobalArgs, OutputFormat, StatusArgs};
use crate::commands::common::{print_json, print_table, ExitCode};
use crate::context::RuntimeContext;

/// Execute the status command
///
/// Read-only. With `--check`, exits with code 1 unless every discovered
/// script is applied and nothing is left failed.
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    ctx.tenant()?;
    let reporter = ctx.status_reporter()?;

    let status = tokio::task::spawn_blocking(move || reporter.try_status())
        .await
        .context("Status task panicked")?
        .context("Failed to compute migration status")?;

    match args.output {
        OutputFormat::Table => print_status(&status),
        OutputFormat::Json => print_json(&status)?,
    }

    if args.check && !status.all_complete {
        return Err(ExitCode(1).into());
    }
    Ok(())
}

/// One row per known script: discovered, applied, or failed.
pub(crate) fn status_rows(status: &MigrationStatus) -> Vec<Vec<String>> {
    let pending: HashSet<&str> = status.pending.iter().map(String::as_str).collect();
    let failed: HashSet<&str> = status.failed.iter().map(String::as_str).collect();
    let drifted: HashSet<&str> = status.drifted.iter().map(|d| d.name.as_str()).collect();

    let mut names: Vec<&str> = status
        .successful
        .iter()
        .chain(&status.pending)
        .chain(&status.failed)
        .map(String::as_str)
        .collect();
    names.sort_unstable();
    names.dedup();

    names
        .into_iter()
        .map(|name| {
            let state = if failed.contains(name) && !pending.contains(name) {
                "failed (script missing)"
            } else if failed.contains(name) {
                "failed"
            } else if pending.contains(name) {
                "pending"
            } else if drifted.contains(name) {
                "applied (changed)"
            } else {
                "applied"
            };
            vec![name.to_string(), state.to_string()]
        })
        .collect()
}

fn print_status(status: &MigrationStatus) {
    println!("Tenant: {}", status.tenant);
    println!(
        "{} discovered, {} applied, {} pending, {} failed",
        status.total,
        status.applied_count(),
        status.pending_count(),
        status.failed.len()
    );
    println!();

    let rows = status_rows(status);
    if !rows.is_empty() {
        print_table(&["NAME", "STATE"], &rows);
        println!();
    }
    if !status.ignored.is_empty() {
        println!("Ignored (not NNN-description.sql): {}", status.ignored.join(", "));
    }

    if status.all_complete {
        println!("All migrations applied");
    } else {
        println!("Migrations outstanding");
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
