//! Split command implementation

use anyhow::{Context, Result};
use tm_core::split_statements;

use crate::cli::SplitArgs;

/// Execute the split command
///
/// Prints each statement the way the apply engine would execute it.
pub async fn execute(args: &SplitArgs) -> Result<()> {
    let sql = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    print!("{}", render_statements(&split_statements(&sql)));
    Ok(())
}

fn render_statements(statements: &[String]) -> String {
    let mut out = String::new();
    for (i, statement) in statements.iter().enumerate() {
        out.push_str(&format!("-- statement {}/{}\n{}\n\n", i + 1, statements.len(), statement));
    }
    out.push_str(&format!("{} statement(s)\n", statements.len()));
    out
}
