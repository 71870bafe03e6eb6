//! History command implementation

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tm_db::Database;
use tm_ledger::MigrationRecord;

use crate::cli::{GlobalArgs, HistoryArgs, OutputFormat};
use crate::commands::common::{format_duration_ms, print_json, print_table, short_checksum};
use crate::context::RuntimeContext;

/// Widest error message shown in table output; JSON carries the full text.
const ERROR_COLUMN_WIDTH: usize = 60;

/// Execute the history command
pub async fn execute(args: &HistoryArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let tenant = ctx.tenant()?;
    let store = ctx.store();
    let db = ctx.open_existing_database()?;

    let records = {
        let session = db.session().context("Failed to open database session")?;
        if store.exists(session.conn())? {
            store
                .history(session.conn(), tenant)
                .context("Failed to read migration history")?
        } else {
            Vec::new()
        }
    };

    match args.output {
        OutputFormat::Table => {
            if records.is_empty() {
                println!("No migration history for tenant '{}'", tenant);
            } else {
                print_table(
                    &["ID", "APPLIED_AT", "NAME", "STATUS", "DURATION", "CHECKSUM", "ERROR"],
                    &history_rows(&records),
                );
            }
        }
        OutputFormat::Json => print_json(&records)?,
    }
    Ok(())
}

fn history_rows(records: &[MigrationRecord]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                format_timestamp(&r.applied_at),
                r.name.clone(),
                r.status.to_string(),
                r.execution_time_ms
                    .map(format_duration_ms)
                    .unwrap_or_else(|| "-".to_string()),
                short_checksum(&r.checksum).to_string(),
                r.error_message
                    .as_deref()
                    .map(|m| one_line(m, ERROR_COLUMN_WIDTH))
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect()
}

/// Drop fractional seconds from a DuckDB timestamp; unknown formats pass through.
fn format_timestamp(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn one_line(message: &str, limit: usize) -> String {
    let flat = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= limit {
        return flat;
    }
    let mut cut: String = flat.chars().take(limit.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
