//! List command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use tm_core::{checksum_file, discover_scripts, Discovery};

use crate::cli::{GlobalArgs, LsArgs, OutputFormat};
use crate::commands::common::{print_json, print_table, short_checksum};
use crate::context::RuntimeContext;

/// Script information for display
#[derive(Debug, Serialize)]
struct ScriptInfo {
    ordinal: u16,
    name: String,
    path: String,
    checksum: String,
}

/// Everything found in the migrations directory
#[derive(Debug, Serialize)]
struct Listing {
    scripts: Vec<ScriptInfo>,
    ignored: Vec<String>,
}

/// Execute the ls command
///
/// Needs neither a tenant nor a database.
pub async fn execute(args: &LsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let discovery =
        discover_scripts(&ctx.migrations_dir()).context("Failed to discover migration scripts")?;
    let listing = build_listing(discovery)?;

    match args.output {
        OutputFormat::Table => print_listing(&listing),
        OutputFormat::Json => print_json(&listing)?,
    }
    Ok(())
}

fn build_listing(discovery: Discovery) -> Result<Listing> {
    let scripts = discovery
        .scripts
        .iter()
        .map(|script| {
            Ok(ScriptInfo {
                ordinal: script.ordinal(),
                name: script.name.to_string(),
                path: script.path.display().to_string(),
                checksum: checksum_file(&script.path)
                    .with_context(|| format!("Failed to checksum {}", script.name))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Listing {
        scripts,
        ignored: discovery.ignored,
    })
}

fn print_listing(listing: &Listing) {
    let rows: Vec<Vec<String>> = listing
        .scripts
        .iter()
        .map(|s| {
            vec![
                format!("{:03}", s.ordinal),
                s.name.clone(),
                short_checksum(&s.checksum).to_string(),
            ]
        })
        .collect();
    print_table(&["ORDINAL", "NAME", "CHECKSUM"], &rows);

    println!();
    println!("{} migration script(s) found", listing.scripts.len());
    if !listing.ignored.is_empty() {
        println!(
            "{} ignored (not NNN-description.sql): {}",
            listing.ignored.len(),
            listing.ignored.join(", ")
        );
    }
}
