///
/// # Behavioral properties
///
/// End-to-end checks of the statement, binding and transaction contracts:
/// change counts, binding persistence across resets, blob round-trips, NULL
/// detection, the Done state, and rollback-on-drop.
///

use sqlite_scope::{Database, Error, Null, Result, Statement, Transaction, OPEN_CREATE, OPEN_READWRITE};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn count(db: &Database, table: &str) -> i32 {
    db.exec_and_get(&format!("SELECT count(*) FROM {table}"))
        .expect("count query")
        .get_int()
        .expect("integer count")
}

#[test]
fn test_exec_reports_rows_actually_changed() {
    init_tracing();
    let db = Database::open_in_memory().unwrap();
    db.exec("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT, n INTEGER)").unwrap();

    let mut insert = Statement::new(&db, "INSERT INTO t (v, n) VALUES (?, ?)").unwrap();
    for i in 0..5 {
        insert.reset().unwrap();
        insert.bind(1, format!("row {i}")).unwrap();
        insert.bind(2, i % 2).unwrap();
        assert_eq!(insert.exec().unwrap(), 1);
    }
    assert_eq!(count(&db, "t"), 5);

    let mut update = Statement::new(&db, "UPDATE t SET v = ? WHERE n = ?").unwrap();
    update.bind(1, "odd").unwrap();
    update.bind(2, 1).unwrap();
    let changed = update.exec().unwrap();
    assert_eq!(changed, 2);
    assert_eq!(changed, db.exec_and_get("SELECT count(*) FROM t WHERE v = 'odd'").unwrap().get_int().unwrap());

    let mut delete = Statement::new(&db, "DELETE FROM t WHERE n = ?").unwrap();
    delete.bind(1, 0).unwrap();
    assert_eq!(delete.exec().unwrap(), 3);
    assert_eq!(count(&db, "t"), 2);

    delete.reset().unwrap();
    assert_eq!(delete.exec().unwrap(), 0);
}

#[test]
fn test_reset_reproduces_bound_values() {
    let db = Database::open_in_memory().unwrap();
    db.exec("CREATE TABLE t (i INTEGER, d REAL, s TEXT, b BLOB)").unwrap();

    let mut insert = Statement::new(&db, "INSERT INTO t VALUES (?, ?, ?, ?)").unwrap();
    insert.bind(1, 42i64).unwrap();
    insert.bind(2, 1.25).unwrap();
    insert.bind(3, "same").unwrap();
    insert.bind(4, &[1u8, 2, 3][..]).unwrap();
    assert_eq!(insert.exec().unwrap(), 1);
    insert.reset().unwrap();
    assert_eq!(insert.exec().unwrap(), 1);

    let mut query = Statement::new(&db, "SELECT i, d, s, b FROM t").unwrap();
    let rows: Vec<(i64, f64, String, Vec<u8>)> = query
        .rows()
        .map(|row| row.and_then(|r| r.get_columns()))
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], rows[1]);
    assert_eq!(rows[0], (42, 1.25, "same".to_string(), vec![1, 2, 3]));
}

#[test]
fn test_clear_bindings_after_reset_reads_null() {
    let db = Database::open_in_memory().unwrap();
    let mut query = Statement::new(&db, "SELECT ?1, :name, @other").unwrap();
    query.bind(1, 1).unwrap();
    query.bind_by_name(":name", "x").unwrap();
    query.bind_by_name("@other", 2.0).unwrap();
    assert!(query.execute_step().unwrap());
    assert!(!query.is_column_null(0).unwrap());

    query.reset().unwrap();
    query.clear_bindings().unwrap();
    assert!(query.execute_step().unwrap());
    for index in 0..3 {
        assert!(query.is_column_null(index).unwrap(), "column {index} should be NULL");
    }
}

#[test]
fn test_blob_with_nul_round_trips() {
    let db = Database::open_in_memory().unwrap();
    db.exec("CREATE TABLE t (id INTEGER PRIMARY KEY, data BLOB)").unwrap();

    let payload: Vec<u8> = (0..=255u8).chain([0, 0, 7, 0]).collect();
    let mut insert = Statement::new(&db, "INSERT INTO t (data) VALUES (?)").unwrap();
    insert.bind(1, &payload).unwrap();
    insert.exec().unwrap();

    let mut query = Statement::new(&db, "SELECT data FROM t").unwrap();
    assert!(query.execute_step().unwrap());
    let column = query.get_column(0).unwrap();
    assert_eq!(column.get_bytes().unwrap() as usize, payload.len());
    assert_eq!(column.get_blob().unwrap(), payload);
}

#[test]
fn test_four_byte_blob_with_embedded_nul() {
    let db = Database::open_in_memory().unwrap();
    let bytes = [0x62u8, 0x6C, 0x00, 0x62];
    let mut query = Statement::new(&db, "SELECT ?").unwrap();
    query.bind(1, bytes).unwrap();
    assert!(query.execute_step().unwrap());

    let column = query.get_column(0).unwrap();
    assert_eq!(column.get_bytes().unwrap(), 4);
    assert_eq!(column.get_string().unwrap().as_bytes(), &bytes);
    assert_eq!(column.get_blob().unwrap(), bytes);
}

#[test]
fn test_is_column_null_is_exact() {
    let db = Database::open_in_memory().unwrap();
    db.exec("CREATE TABLE t (a INTEGER, b REAL, c TEXT, d BLOB)").unwrap();

    let mut insert = Statement::new(&db, "INSERT INTO t VALUES (?, ?, ?, ?)").unwrap();
    insert.bind(1, 1).unwrap();
    insert.bind(2, 2.0).unwrap();
    insert.bind(3, "three").unwrap();
    insert.bind(4, vec![4u8]).unwrap();
    insert.exec().unwrap();

    for null_column in 1..=4 {
        insert.reset().unwrap();
        insert.bind(1, 1).unwrap();
        insert.bind(2, 2.0).unwrap();
        insert.bind(3, "three").unwrap();
        insert.bind(4, vec![4u8]).unwrap();
        insert.bind(null_column, Null).unwrap();
        insert.exec().unwrap();
    }

    let mut query = Statement::new(&db, "SELECT a, b, c, d FROM t ORDER BY rowid").unwrap();
    let mut row_index = 0;
    while query.execute_step().unwrap() {
        for column in 0..4 {
            let expected = row_index > 0 && column == row_index - 1;
            assert_eq!(query.is_column_null(column).unwrap(), expected, "row {row_index}, column {column}");
            let name = query.column_name(column).unwrap();
            assert_eq!(query.is_column_null_by_name(&name).unwrap(), expected);
        }
        row_index += 1;
    }
    assert_eq!(row_index, 5);
}

#[test]
fn test_step_after_done_requires_reset() {
    let db = Database::open_in_memory().unwrap();
    let mut query = Statement::new(&db, "SELECT 1").unwrap();
    assert!(query.execute_step().unwrap());
    assert!(!query.execute_step().unwrap());
    let err = query.execute_step().unwrap_err();
    assert!(matches!(err, Error::NeedsReset));
    assert_eq!(err.code(), sqlite_scope::UNSET_CODE);

    query.reset().unwrap();
    assert!(query.execute_step().unwrap());
}

fn insert_then_fail(db: &Database) -> Result<()> {
    let mut transaction = Transaction::new(db)?;
    db.exec("INSERT INTO t VALUES (1, 'kept')")?;
    transaction.commit()?;
    db.exec("INSERT INTO missing VALUES (1)")?;
    Ok(())
}

fn insert_without_commit(db: &Database) -> Result<()> {
    let _transaction = Transaction::new(db)?;
    db.exec("INSERT INTO t VALUES (2, 'lost')")?;
    db.exec("INSERT INTO missing VALUES (1)")?;
    Ok(())
}

#[test]
fn test_transaction_scope_on_disk() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("transactions.db");
    let path = path.to_str().unwrap();
    {
        let db = Database::open(path, OPEN_READWRITE | OPEN_CREATE).unwrap();
        db.exec("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)").unwrap();

        assert!(insert_then_fail(&db).is_err());
        assert!(insert_without_commit(&db).is_err());
        assert_eq!(count(&db, "t"), 1);
    }

    let reopened = Database::open(path, OPEN_READWRITE).unwrap();
    assert_eq!(count(&reopened, "t"), 1);
    assert_eq!(reopened.exec_and_get("SELECT v FROM t").unwrap().get_text().unwrap(), "kept");
}

#[test]
fn test_select_filtered_rows() {
    let db = Database::open_in_memory().unwrap();
    db.exec("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)").unwrap();
    db.exec("INSERT INTO t VALUES (1, 'a')").unwrap();
    db.exec("INSERT INTO t VALUES (2, 'b')").unwrap();

    let mut query = Statement::new(&db, "SELECT * FROM t WHERE id > 1").unwrap();
    assert!(query.execute_step().unwrap());
    assert_eq!(query.get_column_by_name("id").unwrap().get_int().unwrap(), 2);
    assert_eq!(query.get_column_by_name("v").unwrap().get_text().unwrap(), "b");
    assert!(!query.execute_step().unwrap());
}

#[test]
fn test_exec_and_get_on_fresh_connection() {
    let db = Database::open_in_memory().unwrap();
    let column = db.exec_and_get("SELECT 1+1").unwrap();
    assert_eq!(column.get_int().unwrap(), 2);
    assert_eq!(column.name().unwrap(), "1+1");
}
