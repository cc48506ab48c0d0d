use super::*;

#[tokio::test]
async fn test_in_memory() {
    let db = SqliteBackend::in_memory().unwrap();
    assert_eq!(db.db_type(), "sqlite");
}

#[tokio::test]
async fn test_query_rows_maps_storage_classes() {
    let db = SqliteBackend::in_memory().unwrap();
    db.execute_batch(
        "CREATE TABLE t (id INTEGER, name TEXT, score REAL, data BLOB);
         INSERT INTO t VALUES (1, 'a', 2.5, x'0102');
         INSERT INTO t VALUES (2, NULL, NULL, NULL);",
    )
    .await
    .unwrap();

    let rows = db
        .query_rows("SELECT id, name, score, data FROM t ORDER BY id")
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].columns(), ["id", "name", "score", "data"]);
    assert_eq!(rows[0].get_i64("ID"), Some(1));
    assert_eq!(rows[0].get_str("name"), Some("a"));
    assert_eq!(rows[0].get("score"), Some(&Value::Real(2.5)));
    assert_eq!(rows[0].get("data"), Some(&Value::Blob(vec![1, 2])));
    assert!(rows[1].get("name").unwrap().is_null());
}

#[tokio::test]
async fn test_execute_returns_affected_rows() {
    let db = SqliteBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (1), (2), (3);")
        .await
        .unwrap();
    assert_eq!(db.execute("UPDATE t SET n = n + 1").await.unwrap(), 3);
}

#[tokio::test]
async fn test_pragma_query() {
    let db = SqliteBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (hash TEXT, created_at INTEGER)")
        .await
        .unwrap();
    let rows = db
        .query_rows("SELECT name FROM pragma_table_info('t') ORDER BY cid")
        .await
        .unwrap();
    let names: Vec<&str> = rows.iter().filter_map(|r| r.get_str("name")).collect();
    assert_eq!(names, vec!["hash", "created_at"]);
}

#[tokio::test]
async fn test_execution_error() {
    let db = SqliteBackend::in_memory().unwrap();
    let err = db.query_rows("SELECT * FROM missing_table").await.unwrap_err();
    assert!(matches!(err, DbError::ExecutionError(_)));
    assert!(err.to_string().contains("missing_table"));
}

#[tokio::test]
async fn test_transaction_rollback() {
    let db = SqliteBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (id INTEGER)").await.unwrap();
    db.execute_batch("BEGIN").await.unwrap();
    db.execute_batch("INSERT INTO t VALUES (1)").await.unwrap();
    db.execute_batch("ROLLBACK").await.unwrap();

    let rows = db.query_rows("SELECT COUNT(*) AS c FROM t").await.unwrap();
    assert_eq!(rows[0].get_i64("c"), Some(0));
}
