//! Project fixtures shared by command tests.

use crate::cli::GlobalArgs;
use std::path::Path;
use tempfile::TempDir;

/// Create a project with `tidemark.yml` and the given migration scripts.
///
/// An empty `tenant` leaves the key out of the config.
pub(crate) fn write_project(tenant: &str, scripts: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut config = String::from("database:\n  path: app.duckdb\n");
    if !tenant.is_empty() {
        config.push_str(&format!("tenant: {tenant}\n"));
    }
    std::fs::write(dir.path().join("tidemark.yml"), config).unwrap();

    let migrations = dir.path().join("migrations");
    std::fs::create_dir(&migrations).unwrap();
    for (name, sql) in scripts {
        std::fs::write(migrations.join(name), sql).unwrap();
    }
    dir
}

pub(crate) fn global(project_dir: &Path) -> GlobalArgs {
    GlobalArgs {
        verbose: false,
        project_dir: project_dir.display().to_string(),
        config: None,
        tenant: None,
        database: None,
    }
}

/// Exit code carried by a command error, if any.
pub(crate) fn exit_code(result: anyhow::Result<()>) -> Option<i32> {
    result
        .err()
        .and_then(|e| e.downcast_ref::<crate::commands::common::ExitCode>().map(|c| c.0))
}
