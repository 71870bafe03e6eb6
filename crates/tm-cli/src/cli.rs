//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tidemark - ordered, tenant-scoped SQL schema migrations for DuckDB
#[derive(Parser, Debug)]
#[command(name = "tm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override the tenant from tidemark.yml
    #[arg(short, long, global = true, env = "TIDEMARK_TENANT")]
    pub tenant: Option<String>,

    /// Override the database path (relative to the project directory, or :memory:)
    #[arg(short, long, global = true)]
    pub database: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations in order, halting on the first failure
    Apply(ApplyArgs),

    /// Show applied, pending and failed migrations without changing anything
    Status(StatusArgs),

    /// List migration scripts found in the migrations directory
    Ls(LsArgs),

    /// Show every recorded apply attempt for the tenant
    History(HistoryArgs),

    /// Print the statements a script splits into
    Split(SplitArgs),
}

/// Output formats shared by the reporting commands
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}

/// Arguments for the apply command
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Exit with code 1 unless every migration is applied
    #[arg(long)]
    pub check: bool,
}

/// Arguments for the ls command
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the history command
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Arguments for the split command
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// SQL file to split
    pub file: PathBuf,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
