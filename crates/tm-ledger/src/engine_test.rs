use super::*;
use crate::store::AttemptStatus;
use tempfile::TempDir;
use tm_core::LockMode;
use tm_db::DuckDbBackend;

struct Fixture {
    dir: TempDir,
    db: Arc<DuckDbBackend>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("migrations")).unwrap();
        Self {
            dir,
            db: Arc::new(DuckDbBackend::in_memory().unwrap()),
        }
    }

    fn migrations(&self) -> std::path::PathBuf {
        self.dir.path().join("migrations")
    }

    fn script(&self, name: &str, sql: &str) {
        std::fs::write(self.migrations().join(name), sql).unwrap();
    }

    fn settings(&self) -> MigrationSettings {
        MigrationSettings::new("t1", self.migrations())
    }

    fn engine(&self) -> MigrationEngine<DuckDbBackend> {
        MigrationEngine::new(Arc::clone(&self.db), self.settings())
    }

    fn count(&self, sql: &str) -> i64 {
        self.db
            .session()
            .unwrap()
            .conn()
            .query_row(sql, [], |row| row.get(0))
            .unwrap()
    }

    fn ledger_rows(&self) -> i64 {
        self.count("SELECT COUNT(*) FROM main.applied_migrations")
    }

    fn table_exists(&self, table: &str) -> bool {
        self.db
            .session()
            .unwrap()
            .relation_exists("main", table)
            .unwrap()
    }
}

#[test]
fn test_apply_in_name_order() {
    let fx = Fixture::new();
    fx.script("003-c.sql", "INSERT INTO log VALUES (3);");
    fx.script("001-a.sql", "CREATE TABLE log (step INT);");
    fx.script("002-b.sql", "INSERT INTO log VALUES (2);");

    let report = fx.engine().apply_pending().unwrap();
    assert_eq!(report.applied, vec!["001-a.sql", "002-b.sql", "003-c.sql"]);
    assert_eq!(report.outcome, RunOutcome::Success);
    assert_eq!(report.tenant, "t1");
    assert_eq!(fx.count("SELECT COUNT(*) FROM log"), 2);
}

#[test]
fn test_second_run_is_idempotent() {
    let fx = Fixture::new();
    fx.script("001-a.sql", "CREATE TABLE a (id INT);");
    let engine = fx.engine();

    assert_eq!(engine.apply_pending().unwrap().applied.len(), 1);
    let rows = fx.ledger_rows();

    let second = engine.apply_pending().unwrap();
    assert!(second.applied.is_empty());
    assert!(second.is_success());
    assert_eq!(fx.ledger_rows(), rows);
    assert!(engine.is_migration_complete());
}

#[test]
fn test_empty_directory_completes() {
    let fx = Fixture::new();
    let engine = fx.engine();
    let report = engine.apply_pending().unwrap();
    assert!(report.applied.is_empty());
    assert!(engine.completion_flag().is_set());
    assert!(fx.table_exists("applied_migrations"));
}

#[test]
fn test_halt_on_failure() {
    let fx = Fixture::new();
    fx.script("001-ok.sql", "CREATE TABLE ok1 (id INT);");
    fx.script(
        "002-bad.sql",
        "CREATE TABLE partial (id INT);\nSELECT * FROM no_such_table;",
    );
    fx.script("003-ok.sql", "CREATE TABLE ok3 (id INT);");
    let engine = fx.engine();

    let report = engine.apply_pending().unwrap();
    assert_eq!(report.applied, vec!["001-ok.sql"]);
    assert_eq!(report.outcome, RunOutcome::HaltedOnFailure);
    let failed = report.failed.unwrap();
    assert_eq!(failed.name, "002-bad.sql");
    assert!(failed.error.contains("no_such_table"));

    assert!(!engine.completion_flag().is_set());
    assert!(!engine.is_migration_complete());
    assert!(!fx.table_exists("partial"));
    assert!(!fx.table_exists("ok3"));

    let history = engine
        .store()
        .history(fx.db.session().unwrap().conn(), "t1")
        .unwrap();
    let rows: Vec<(&str, AttemptStatus)> = history
        .iter()
        .map(|r| (r.name.as_str(), r.status))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("001-ok.sql", AttemptStatus::Success),
            ("002-bad.sql", AttemptStatus::Error),
        ]
    );
    assert!(history[1].error_message.is_some());
}

#[test]
fn test_retry_appends_another_error_row() {
    let fx = Fixture::new();
    fx.script("001-bad.sql", "SELECT * FROM no_such_table;");
    let engine = fx.engine();

    engine.apply_pending().unwrap();
    engine.apply_pending().unwrap();
    assert_eq!(
        fx.count("SELECT COUNT(*) FROM main.applied_migrations WHERE status = 'error'"),
        2
    );
}

#[test]
fn test_fixed_script_applies_after_failure() {
    let fx = Fixture::new();
    fx.script("001-a.sql", "SELECT * FROM no_such_table;");
    let engine = fx.engine();
    assert!(!engine.apply_pending().unwrap().is_success());

    fx.script("001-a.sql", "CREATE TABLE a (id INT);");
    let report = engine.apply_pending().unwrap();
    assert_eq!(report.applied, vec!["001-a.sql"]);
    assert!(engine.completion_flag().is_set());
    assert_eq!(fx.ledger_rows(), 2);
}

#[test]
fn test_new_failing_script_clears_completion() {
    let fx = Fixture::new();
    fx.script("001-a.sql", "CREATE TABLE a (id INT);");
    let engine = fx.engine();
    engine.apply_pending().unwrap();
    assert!(engine.completion_flag().is_set());

    fx.script("002-b.sql", "SELECT * FROM no_such_table;");
    engine.apply_pending().unwrap();
    assert!(!engine.completion_flag().is_set());
}

#[test]
fn test_error_message_is_truncated() {
    let fx = Fixture::new();
    fx.script("001-bad.sql", "SELECT * FROM no_such_table;");
    let mut settings = fx.settings();
    settings.error_message_limit = 10;
    let engine = MigrationEngine::new(Arc::clone(&fx.db), settings);

    let report = engine.apply_pending().unwrap();
    assert_eq!(report.failed.unwrap().error.chars().count(), 10);
    let stored: String = fx
        .db
        .session()
        .unwrap()
        .conn()
        .query_row(
            "SELECT error_message FROM main.applied_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored.chars().count(), 10);
}

#[test]
fn test_failure_row_write_error_is_swallowed() {
    let fx = Fixture::new();
    let engine = fx.engine();
    // The ledger table was never created, so the insert fails.
    let session = fx.db.session().unwrap();
    engine.record_failure_best_effort(
        &session,
        &NewAttempt::failure("001-a.sql", "t1", "abc", 1.0, "boom".to_string()),
    );
    assert!(!session.relation_exists("main", "applied_migrations").unwrap());
}

#[test]
fn test_dollar_quoted_script() {
    let fx = Fixture::new();
    fx.script(
        "001-notes.sql",
        "CREATE TABLE notes (body VARCHAR); -- setup\nINSERT INTO notes VALUES ($$semi; colon$$);",
    );
    fx.engine().apply_pending().unwrap();
    let body: String = fx
        .db
        .session()
        .unwrap()
        .conn()
        .query_row("SELECT body FROM notes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(body, "semi; colon");
}

#[test]
fn test_checksum_recorded_from_file_bytes() {
    let fx = Fixture::new();
    let sql = "CREATE TABLE a (id INT);";
    fx.script("001-a.sql", sql);
    fx.engine().apply_pending().unwrap();
    let stored: String = fx
        .db
        .session()
        .unwrap()
        .conn()
        .query_row("SELECT checksum FROM main.applied_migrations", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(stored, compute_checksum(sql.as_bytes()));
}

#[test]
fn test_drift_is_reported_not_reapplied() {
    let fx = Fixture::new();
    fx.script("001-a.sql", "CREATE TABLE a (id INT);");
    let engine = fx.engine();
    engine.apply_pending().unwrap();

    fx.script("001-a.sql", "CREATE TABLE a (id INT, name VARCHAR);");
    let report = engine.apply_pending().unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.drifted.len(), 1);
    assert_eq!(report.drifted[0].name, "001-a.sql");
    assert_eq!(fx.ledger_rows(), 1);
}

#[test]
fn test_tenants_have_independent_histories() {
    let fx = Fixture::new();
    fx.script("001-a.sql", "CREATE TABLE IF NOT EXISTS a (id INT);");
    fx.engine().apply_pending().unwrap();

    let other = MigrationEngine::new(
        Arc::clone(&fx.db),
        MigrationSettings::new("t2", fx.migrations()),
    );
    let report = other.apply_pending().unwrap();
    assert_eq!(report.applied, vec!["001-a.sql"]);
    assert_eq!(fx.ledger_rows(), 2);
}

#[test]
fn test_missing_tenant_is_fatal() {
    let fx = Fixture::new();
    fx.script("001-a.sql", "CREATE TABLE a (id INT);");
    let engine = MigrationEngine::new(
        Arc::clone(&fx.db),
        MigrationSettings::new("   ", fx.migrations()),
    );
    let err = engine.apply_pending().unwrap_err();
    assert!(matches!(err, LedgerError::Core(CoreError::TenantMissing)));
    assert!(!engine.completion_flag().is_set());
    assert!(!fx.table_exists("applied_migrations"));
}

#[test]
fn test_missing_directory_is_fatal() {
    let fx = Fixture::new();
    let engine = MigrationEngine::new(
        Arc::clone(&fx.db),
        MigrationSettings::new("t1", fx.dir.path().join("nope")),
    );
    let err = engine.apply_pending().unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Core(CoreError::MigrationsDirNotFound { .. })
    ));
    assert!(!fx.table_exists("applied_migrations"));
}

#[test]
fn test_invalid_utf8_is_fatal_and_unrecorded() {
    let fx = Fixture::new();
    std::fs::write(fx.migrations().join("001-bin.sql"), [0xff, 0xfe, 0x00]).unwrap();
    let engine = fx.engine();
    let err = engine.apply_pending().unwrap_err();
    assert!(matches!(err, LedgerError::ScriptEncoding { .. }));
    assert_eq!(fx.ledger_rows(), 0);
}

#[test]
fn test_held_lock_fails_before_ledger_write() {
    let dir = TempDir::new().unwrap();
    let migrations = dir.path().join("migrations");
    std::fs::create_dir(&migrations).unwrap();
    std::fs::write(migrations.join("001-a.sql"), "CREATE TABLE a (id INT);").unwrap();

    let db_path = dir.path().join("app.duckdb");
    let db = Arc::new(DuckDbBackend::from_path(&db_path).unwrap());
    let _held = RunLock::acquire(LockMode::File, Some(&db_path), "other").unwrap();

    let mut settings = MigrationSettings::new("t1", &migrations);
    settings.lock = LockMode::File;
    let engine = MigrationEngine::new(Arc::clone(&db), settings);

    let err = engine.apply_pending().unwrap_err();
    assert!(matches!(err, LedgerError::LockHeld { .. }));
    assert!(!db
        .session()
        .unwrap()
        .relation_exists("main", "applied_migrations")
        .unwrap());
}

#[test]
fn test_lock_released_after_run() {
    let dir = TempDir::new().unwrap();
    let migrations = dir.path().join("migrations");
    std::fs::create_dir(&migrations).unwrap();
    let db_path = dir.path().join("app.duckdb");
    let db = Arc::new(DuckDbBackend::from_path(&db_path).unwrap());

    let mut settings = MigrationSettings::new("t1", &migrations);
    settings.lock = LockMode::File;
    let engine = MigrationEngine::new(db, settings);
    engine.apply_pending().unwrap();
    assert!(RunLock::acquire(LockMode::File, Some(&db_path), "t1")
        .unwrap()
        .is_some());
    engine.apply_pending().unwrap();
}

#[test]
fn test_stale_lock_file_does_not_block_run() {
    let dir = TempDir::new().unwrap();
    let migrations = dir.path().join("migrations");
    std::fs::create_dir(&migrations).unwrap();
    std::fs::write(migrations.join("001-a.sql"), "CREATE TABLE a (id INT);").unwrap();

    let db_path = dir.path().join("app.duckdb");
    let db = Arc::new(DuckDbBackend::from_path(&db_path).unwrap());
    // Left behind by a process that died mid-run.
    std::fs::write(RunLock::lock_path(&db_path), "pid=4194303\ntenant=t1\n").unwrap();

    let mut settings = MigrationSettings::new("t1", &migrations);
    settings.lock = LockMode::File;
    let engine = MigrationEngine::new(db, settings);

    let report = engine.apply_pending().unwrap();
    assert_eq!(report.applied, vec!["001-a.sql"]);
    assert!(engine.apply_pending().unwrap().applied.is_empty());
    assert!(engine.is_migration_complete());
}

#[test]
fn test_shared_completion_flag() {
    let fx = Fixture::new();
    let flag = CompletionFlag::new();
    let engine = fx.engine().with_completion_flag(flag.clone());
    engine.apply_pending().unwrap();
    assert!(flag.is_set());
}

#[test]
fn test_is_complete_falls_back_to_status() {
    let fx = Fixture::new();
    fx.script("001-a.sql", "CREATE TABLE a (id INT);");
    fx.engine().apply_pending().unwrap();

    // A fresh engine has not run but sees the migrated database.
    let fresh = fx.engine();
    assert!(!fresh.completion_flag().is_set());
    assert!(fresh.is_migration_complete());
    assert_eq!(fresh.migration_status().applied_count(), 1);
}

#[test]
fn test_truncate_chars() {
    assert_eq!(truncate_chars("abcdef", 3), "abc");
    assert_eq!(truncate_chars("abc", 10), "abc");
    assert_eq!(truncate_chars("ééé", 2), "éé");
}

#[test]
fn test_run_phase_display() {
    assert_eq!(RunPhase::Applying(0).to_string(), "applying #1");
    assert_eq!(RunPhase::HaltedOnFailure.to_string(), "halted on failure");
}
