use super::*;

#[test]
fn test_parse_minimal_config() {
    let config: Config = serde_yaml::from_str("tenant: billing").unwrap();
    assert_eq!(config.tenant.as_ref().unwrap(), "billing");
    assert_eq!(config.migrations_path, "migrations");
    assert_eq!(config.database.path, "tidemark.duckdb");
    assert_eq!(config.ledger.qualified_name(), "main.applied_migrations");
    assert_eq!(config.lock, LockMode::File);
    assert_eq!(config.error_message_limit, 1000);
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
tenant: crm
migrations_path: db/migrations
database:
  path: ":memory:"
ledger:
  schema: ops
  table: schema_history
lock: none
error_message_limit: 250
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    config.validate().unwrap();
    assert_eq!(config.tenant.as_ref().unwrap(), "crm");
    assert_eq!(config.ledger.qualified_name(), "ops.schema_history");
    assert_eq!(config.lock, LockMode::None);
    assert_eq!(config.error_message_limit, 250);

    let root = std::path::PathBuf::from("/srv/app");
    assert_eq!(
        config.migrations_path_absolute(&root),
        root.join("db/migrations")
    );
    assert_eq!(config.database_path_absolute(&root), ":memory:");
}

#[test]
fn test_tenant_is_optional_in_file() {
    let config: Config = serde_yaml::from_str("migrations_path: migrations").unwrap();
    assert!(config.tenant.is_none());
    assert!(matches!(
        config.require_tenant(),
        Err(CoreError::TenantMissing)
    ));
}

#[test]
fn test_unknown_field_rejected() {
    let result: Result<Config, _> = serde_yaml::from_str("tenant: a\nmodel_paths: [x]");
    assert!(result.is_err());
}

#[test]
fn test_tenant_override_takes_precedence() {
    let config: Config = serde_yaml::from_str("tenant: from_file").unwrap();
    let config = config.with_tenant_override(Some("from_cli"));
    assert_eq!(config.require_tenant().unwrap(), "from_cli");
}

#[test]
fn test_blank_tenant_override_is_ignored() {
    let config: Config = serde_yaml::from_str("tenant: from_file").unwrap();
    let config = config.with_tenant_override(Some("   "));
    assert_eq!(config.require_tenant().unwrap(), "from_file");

    let config = config.with_tenant_override(None);
    assert_eq!(config.require_tenant().unwrap(), "from_file");
}

#[test]
fn test_invalid_ledger_identifier() {
    let config: Config =
        serde_yaml::from_str("ledger:\n  table: \"applied; DROP TABLE x\"").unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("ledger.table"));
}

#[test]
fn test_zero_error_message_limit_rejected() {
    let config: Config = serde_yaml::from_str("error_message_limit: 0").unwrap();
    assert!(matches!(
        config.validate(),
        Err(CoreError::ConfigInvalid { .. })
    ));
}

#[test]
fn test_load_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tidemark.yml"), "tenant: billing\n").unwrap();
    let config = Config::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.require_tenant().unwrap(), "billing");
}

#[test]
fn test_load_from_dir_yaml_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tidemark.yaml"), "tenant: billing\n").unwrap();
    assert!(Config::load_from_dir(dir.path()).is_ok());
}

#[test]
fn test_load_from_dir_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}

#[test]
fn test_load_reports_parse_error_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tidemark.yml");
    std::fs::write(&path, "tenant: [unclosed").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, CoreError::ConfigParseError { .. }));
    assert!(err.to_string().contains("tidemark.yml"));
}

#[test]
fn test_database_path_resolved_against_root() {
    let config = Config::default();
    let root = std::path::PathBuf::from("/srv/app");
    assert_eq!(
        config.database_path_absolute(&root),
        root.join("tidemark.duckdb").display().to_string()
    );
}
