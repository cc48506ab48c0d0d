use super::*;
use crate::snapshot::ROOT_ID;
use std::fs;
use tempfile::tempdir;

fn write_unit(dir: &Path, folder: &str, snapshot: &str, sql: Option<&str>) {
    let unit = dir.join(folder);
    fs::create_dir_all(&unit).unwrap();
    fs::write(unit.join(SNAPSHOT_FILE), snapshot).unwrap();
    if let Some(sql) = sql {
        fs::write(unit.join(SCRIPT_FILE), sql).unwrap();
    }
}

fn snapshot(id: &str, prev_id: &str) -> String {
    format!(r#"{{"id": "{id}", "prevId": "{prev_id}"}}"#)
}

#[test]
fn test_load_ordered_reads_units() {
    let dir = tempdir().unwrap();
    let first_sql = "CREATE TABLE users (id INT);\n--> statement-breakpoint\nCREATE INDEX users_id ON users (id);\n";
    write_unit(
        dir.path(),
        "1700000000000_init",
        &snapshot("a", ROOT_ID),
        Some(first_sql),
    );
    write_unit(
        dir.path(),
        "1700000001000_posts",
        r#"{"id": "b", "prevId": "a", "_meta": {"breakpoints": false}}"#,
        Some("CREATE TABLE posts (id INT);"),
    );

    let units = load_ordered(dir.path()).unwrap();
    assert_eq!(units.len(), 2);

    let first = &units[0];
    assert_eq!(first.id, "a");
    assert_eq!(first.tag, "1700000000000_init");
    assert_eq!(first.created_at_millis, 1_700_000_000_000);
    assert_eq!(first.statements.len(), 2);
    assert!(first.breakpoints);
    assert_eq!(first.sql, first_sql);
    assert_eq!(first.hash, compute_checksum(first_sql));

    let second = &units[1];
    assert_eq!(second.prev_id, "a");
    assert!(!second.breakpoints);
    assert_eq!(second.statements, vec!["CREATE TABLE posts (id INT);"]);
}

#[test]
fn test_missing_directory_is_fatal() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("migrations");
    let err = load_ordered(&missing).unwrap_err();
    assert!(matches!(err, CoreError::MissingDirectory { .. }));
    assert!(err.to_string().contains("migrations"));
}

#[test]
fn test_empty_directory_loads_nothing() {
    let dir = tempdir().unwrap();
    assert!(load_ordered(dir.path()).unwrap().is_empty());
}

#[test]
fn test_missing_script_is_fatal() {
    let dir = tempdir().unwrap();
    write_unit(dir.path(), "1700000000000_init", &snapshot("a", ROOT_ID), None);

    let err = load_ordered(dir.path()).unwrap_err();
    match &err {
        CoreError::MissingArtifact { unit, path, .. } => {
            assert_eq!(unit, "1700000000000_init");
            assert!(path.ends_with("up.sql"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_untimestamped_folder_is_fatal() {
    let dir = tempdir().unwrap();
    write_unit(dir.path(), "init", &snapshot("a", ROOT_ID), Some("SELECT 1;"));

    let err = load_ordered(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::MalformedUnitName { ref name } if name == "init"));
}

#[test]
fn test_orphans_are_not_loaded() {
    let dir = tempdir().unwrap();
    write_unit(
        dir.path(),
        "1700000000000_init",
        &snapshot("a", ROOT_ID),
        Some("SELECT 1;"),
    );
    // Dangling unit with no script: never reached, so never an error
    write_unit(dir.path(), "1700000001000_lost", &snapshot("b", "zzz"), None);

    let units = load_ordered(dir.path()).unwrap();
    assert_eq!(units.len(), 1);
}
