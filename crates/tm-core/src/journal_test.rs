use super::*;
use crate::reader::load_ordered;
use crate::snapshot::ROOT_ID;
use std::fs;
use tempfile::tempdir;

const FIRST_SQL: &str =
    "CREATE TABLE \"users\" (\"id\" serial PRIMARY KEY);\n--> statement-breakpoint\nCREATE INDEX \"users_idx\" ON \"users\" (\"id\");";
const SECOND_SQL: &str = "ALTER TABLE \"users\" ADD COLUMN \"name\" text;\n";

/// Build a two-entry legacy layout under `dir`.
fn write_legacy(dir: &Path) {
    let meta = dir.join(META_DIR);
    fs::create_dir_all(&meta).unwrap();
    fs::write(
        meta.join(JOURNAL_FILE),
        r#"{
  "version": "7",
  "dialect": "postgresql",
  "entries": [
    {"idx": 1, "version": "7", "when": 1700000001000, "tag": "0001_brave_wolf", "breakpoints": false},
    {"idx": 0, "version": "7", "when": 1700000000000, "tag": "0000_cool_name", "breakpoints": true}
  ]
}"#,
    )
    .unwrap();
    fs::write(
        meta.join("0000_snapshot.json"),
        format!(r#"{{"id": "aaa", "prevId": "{ROOT_ID}", "tables": {{}}, "_meta": {{"schemas": {{}}}}}}"#),
    )
    .unwrap();
    fs::write(
        meta.join("0001_snapshot.json"),
        r#"{"id": "bbb", "prevId": "aaa", "tables": {}}"#,
    )
    .unwrap();
    fs::write(dir.join("0000_cool_name.sql"), FIRST_SQL).unwrap();
    fs::write(dir.join("0001_brave_wolf.sql"), SECOND_SQL).unwrap();
}

#[test]
fn test_entry_names() {
    let entry = JournalEntry {
        idx: 3,
        when: 1_700_000_000_000,
        tag: "0003_brave_wolf".to_string(),
        breakpoints: true,
    };
    assert_eq!(entry.snapshot_file_name(), "0003_snapshot.json");
    assert_eq!(entry.folder_name(), "1700000000000_brave_wolf");

    let custom = JournalEntry {
        idx: 7,
        when: 5,
        tag: "custom".to_string(),
        breakpoints: true,
    };
    assert_eq!(custom.snapshot_file_name(), "0007_snapshot.json");
    assert_eq!(custom.folder_name(), "5_custom");
}

#[test]
fn test_convert_writes_folders_in_journal_order() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_legacy(src.path());

    let report = convert(src.path(), dest.path(), false).unwrap();
    assert_eq!(report.migrated, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(
        report.folders,
        vec!["1700000000000_cool_name", "1700000001000_brave_wolf"]
    );
    assert!(!report.hybrid);

    let units = load_ordered(dest.path()).unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].id, "aaa");
    assert_eq!(units[0].sql, FIRST_SQL);
    assert!(units[0].breakpoints);
    assert_eq!(units[1].sql, SECOND_SQL);
    assert!(!units[1].breakpoints);
}

#[test]
fn test_convert_leaves_sources_untouched() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_legacy(src.path());
    let journal_before = fs::read(src.path().join(META_DIR).join(JOURNAL_FILE)).unwrap();

    convert(src.path(), dest.path(), false).unwrap();

    assert_eq!(
        fs::read(src.path().join(META_DIR).join(JOURNAL_FILE)).unwrap(),
        journal_before
    );
    assert_eq!(
        fs::read_to_string(src.path().join("0000_cool_name.sql")).unwrap(),
        FIRST_SQL
    );
}

#[test]
fn test_convert_is_rerunnable() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_legacy(src.path());

    convert(src.path(), dest.path(), false).unwrap();
    let again = convert(src.path(), dest.path(), false).unwrap();
    assert_eq!(again.migrated, 0);
    assert_eq!(again.skipped, 2);
    assert_eq!(load_ordered(dest.path()).unwrap().len(), 2);
}

#[test]
fn test_dry_run_matches_real_run() {
    let src = tempdir().unwrap();
    let dry_dest = tempdir().unwrap();
    let real_dest = tempdir().unwrap();
    write_legacy(src.path());

    let dry = convert(src.path(), dry_dest.path(), true).unwrap();
    assert!(fs::read_dir(dry_dest.path()).unwrap().next().is_none());

    let real = convert(src.path(), real_dest.path(), false).unwrap();
    assert_eq!(dry, real);
}

#[test]
fn test_in_place_conversion_reports_hybrid_on_rerun() {
    let src = tempdir().unwrap();
    write_legacy(src.path());

    let first = convert(src.path(), src.path(), false).unwrap();
    assert!(!first.hybrid);
    assert_eq!(first.migrated, 2);

    let second = convert(src.path(), src.path(), false).unwrap();
    assert!(second.hybrid);
    assert_eq!(second.skipped, 2);
}

#[test]
fn test_skips_ids_already_in_destination_chain() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_legacy(src.path());

    // Same unit already converted under a different folder name
    let store = SnapshotStore::new(dest.path());
    store
        .write_unit(
            "1699999999999_renamed",
            FIRST_SQL,
            &serde_json::json!({"id": "aaa", "prevId": ROOT_ID}),
        )
        .unwrap();

    let report = convert(src.path(), dest.path(), false).unwrap();
    assert_eq!(report.migrated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.folders, vec!["1700000001000_brave_wolf"]);
}

#[test]
fn test_missing_files_are_all_reported() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_legacy(src.path());
    fs::remove_file(src.path().join("0001_brave_wolf.sql")).unwrap();
    fs::remove_file(src.path().join(META_DIR).join("0000_snapshot.json")).unwrap();

    let err = convert(src.path(), dest.path(), false).unwrap_err();
    match &err {
        CoreError::LegacyStructureInvalid { missing, .. } => {
            assert_eq!(missing.len(), 2);
            assert!(missing.iter().any(|m| m.ends_with("0001_brave_wolf.sql")));
            assert!(missing.iter().any(|m| m.ends_with("0000_snapshot.json")));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("0001_brave_wolf.sql"));
    assert!(fs::read_dir(dest.path()).unwrap().next().is_none());
}

#[test]
fn test_missing_journal_is_fatal() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();

    let err = convert(src.path(), dest.path(), true).unwrap_err();
    assert!(err.to_string().contains(JOURNAL_FILE));
}

#[test]
fn test_malformed_journal_is_fatal() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    fs::create_dir_all(src.path().join(META_DIR)).unwrap();
    fs::write(src.path().join(META_DIR).join(JOURNAL_FILE), r#"{"entries": 5}"#).unwrap();

    let err = convert(src.path(), dest.path(), false).unwrap_err();
    match err {
        CoreError::LegacyStructureInvalid { missing, .. } => {
            assert!(missing[0].contains("malformed"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_colliding_folder_names_keep_first_entry() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let meta = src.path().join(META_DIR);
    fs::create_dir_all(&meta).unwrap();
    fs::write(
        meta.join(JOURNAL_FILE),
        r#"{
  "version": "7",
  "dialect": "postgresql",
  "entries": [
    {"idx": 0, "version": "7", "when": 1700000000000, "tag": "0000_users", "breakpoints": true},
    {"idx": 1, "version": "7", "when": 1700000000000, "tag": "0001_users", "breakpoints": true}
  ]
}"#,
    )
    .unwrap();
    fs::write(
        meta.join("0000_snapshot.json"),
        format!(r#"{{"id": "aaa", "prevId": "{ROOT_ID}"}}"#),
    )
    .unwrap();
    fs::write(
        meta.join("0001_snapshot.json"),
        r#"{"id": "bbb", "prevId": "aaa"}"#,
    )
    .unwrap();
    fs::write(src.path().join("0000_users.sql"), FIRST_SQL).unwrap();
    fs::write(src.path().join("0001_users.sql"), SECOND_SQL).unwrap();

    let dry = convert(src.path(), dest.path(), true).unwrap();
    let report = convert(src.path(), dest.path(), false).unwrap();
    assert_eq!(dry, report);
    assert_eq!(report.migrated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.folders, vec!["1700000000000_users"]);

    let units = load_ordered(dest.path()).unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].sql, FIRST_SQL);
}
