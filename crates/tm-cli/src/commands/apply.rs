//! Apply command implementation

use anyhow::{Context, Result};
use tm_ledger::ApplyReport;

use crate::cli::{ApplyArgs, GlobalArgs, OutputFormat};
use crate::commands::common::{format_duration_ms, print_json, ExitCode};
use crate::context::RuntimeContext;

/// Execute the apply command
///
/// Exits with code 1 when a script fails and the run halts.
pub async fn execute(args: &ApplyArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    ctx.tenant()?;
    let engine = ctx.engine()?;

    let report = tokio::task::spawn_blocking(move || engine.apply_pending())
        .await
        .context("Migration task panicked")?
        .context("Migration run failed")?;

    match args.output {
        OutputFormat::Table => print_report(&report),
        OutputFormat::Json => print_json(&report)?,
    }

    if !report.is_success() {
        return Err(ExitCode(1).into());
    }
    Ok(())
}

fn print_report(report: &ApplyReport) {
    for drift in &report.drifted {
        println!("  ! {} changed since it was applied (not re-applied)", drift.name);
    }

    if report.applied.is_empty() && report.failed.is_none() {
        println!("No pending migrations for tenant '{}'", report.tenant);
        return;
    }

    for name in &report.applied {
        println!("  \u{2713} {}", name);
    }
    if let Some(failed) = &report.failed {
        println!(
            "  \u{2717} {} ({}): {}",
            failed.name,
            format_duration_ms(failed.execution_time_ms),
            failed.error
        );
    }

    println!();
    match &report.failed {
        None => println!(
            "Applied {} migration(s) for tenant '{}' in {}",
            report.applied.len(),
            report.tenant,
            format_duration_ms(report.elapsed_ms)
        ),
        Some(failed) => println!(
            "Halted at {} after applying {} migration(s); fix the script and run again",
            failed.name,
            report.applied.len()
        ),
    }
}

#[cfg(test)]
#[path = "apply_test.rs"]
mod tests;
