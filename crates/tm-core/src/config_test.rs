use super::*;
use tempfile::tempdir;

#[test]
fn test_defaults_from_empty_document() {
    let config: MigrateConfig = serde_yaml::from_str("{}").unwrap();
    assert_eq!(config, MigrateConfig::default());
    assert_eq!(config.ledger.table, DEFAULT_LEDGER_TABLE);
    assert_eq!(config.ledger.schema.as_deref(), Some(DEFAULT_LEDGER_SCHEMA));
    assert_eq!(config.transaction, TransactionScope::PerUnit);
    assert!(config.legacy_ledger.is_none());
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
migrations_dir: db/migrations
ledger:
  table: schema_history
  schema: ops
legacy_ledger:
  table: __old_migrations
  schema: legacy
transaction: run
"#;
    let config: MigrateConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
    assert_eq!(config.ledger, LedgerLocation::new("schema_history", Some("ops")));
    assert_eq!(
        config.legacy_ledger,
        Some(LedgerLocation::new("__old_migrations", Some("legacy")))
    );
    assert_eq!(config.transaction, TransactionScope::Run);
}

#[test]
fn test_unknown_fields_rejected() {
    let result: Result<MigrateConfig, _> = serde_yaml::from_str("ledgr: {}\n");
    assert!(result.is_err());
}

#[test]
fn test_load_validates_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tidemark.yml");
    std::fs::write(&path, "ledger:\n  table: \"\"\n").unwrap();
    let err = MigrateConfig::load(&path).unwrap_err();
    assert!(matches!(err, CoreError::ConfigInvalid { .. }));
}

#[test]
fn test_load_from_dir_resolves_relative_migrations_dir() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("tidemark.yaml"), "migrations_dir: db\n").unwrap();
    let config = MigrateConfig::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.migrations_dir, dir.path().join("db"));
}

#[test]
fn test_load_from_dir_missing() {
    let dir = tempdir().unwrap();
    let err = MigrateConfig::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}

// These tests modify environment variables and must run serially
use serial_test::serial;

fn restore(key: &str, original: Option<String>) {
    match original {
        Some(v) => std::env::set_var(key, v),
        None => std::env::remove_var(key),
    }
}

#[test]
#[serial]
fn test_legacy_ledger_env_takes_precedence() {
    let table = std::env::var(LEGACY_TABLE_ENV).ok();
    let schema = std::env::var(LEGACY_SCHEMA_ENV).ok();
    std::env::set_var(LEGACY_TABLE_ENV, "__env_migrations");
    std::env::set_var(LEGACY_SCHEMA_ENV, "env_schema");

    let config = MigrateConfig {
        legacy_ledger: Some(LedgerLocation::new("__file_migrations", None)),
        ..MigrateConfig::default()
    };
    assert_eq!(
        config.resolve_legacy_ledger(),
        Some(LedgerLocation::new("__env_migrations", Some("env_schema")))
    );

    restore(LEGACY_TABLE_ENV, table);
    restore(LEGACY_SCHEMA_ENV, schema);
}

#[test]
#[serial]
fn test_legacy_ledger_falls_back_to_file() {
    let table = std::env::var(LEGACY_TABLE_ENV).ok();
    std::env::remove_var(LEGACY_TABLE_ENV);

    let config = MigrateConfig {
        legacy_ledger: Some(LedgerLocation::new("__file_migrations", None)),
        ..MigrateConfig::default()
    };
    assert_eq!(
        config.resolve_legacy_ledger(),
        Some(LedgerLocation::new("__file_migrations", None))
    );
    assert_eq!(MigrateConfig::default().resolve_legacy_ledger(), None);

    restore(LEGACY_TABLE_ENV, table);
}

#[test]
fn test_ledger_schema_defaults_and_can_be_cleared() {
    let config: MigrateConfig = serde_yaml::from_str("ledger:\n  table: history\n").unwrap();
    assert_eq!(config.ledger.schema.as_deref(), Some(DEFAULT_LEDGER_SCHEMA));

    let config: MigrateConfig =
        serde_yaml::from_str("ledger:\n  table: history\n  schema: null\n").unwrap();
    assert_eq!(config.ledger.schema, None);
}

#[test]
fn test_legacy_ledger_without_schema_uses_dialect_default() {
    let config: MigrateConfig =
        serde_yaml::from_str("legacy_ledger:\n  table: old_migrations\n").unwrap();
    assert_eq!(
        config.legacy_ledger,
        Some(LedgerLocation::new("old_migrations", None))
    );
    // The new ledger keeps its own default namespace
    assert_eq!(config.ledger.schema.as_deref(), Some(DEFAULT_LEDGER_SCHEMA));
}

#[test]
fn test_legacy_ledger_requires_table() {
    let result: Result<MigrateConfig, _> =
        serde_yaml::from_str("legacy_ledger:\n  schema: legacy\n");
    assert!(result.is_err());

    let config: MigrateConfig = serde_yaml::from_str("legacy_ledger: null\n").unwrap();
    assert!(config.legacy_ledger.is_none());
}
