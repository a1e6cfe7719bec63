///
/// # Resource lifecycle tests
///
/// Backups between connections, lock contention with a busy timeout,
/// views that outlive their row or statement, and savepoints on a file
/// database.
///

use sqlite_scope::{
    Backup, Database, Error, OpenMode, OpenOptions, Savepoint, Statement, DONE, OPEN_CREATE, OPEN_READONLY,
    OPEN_READWRITE, READONLY,
};
use tempfile::TempDir;

fn populated() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.exec(
        "CREATE TABLE backup_test (id INTEGER PRIMARY KEY, value TEXT, data BLOB);
         INSERT INTO backup_test VALUES (1, 'first', x'00ff00');
         INSERT INTO backup_test VALUES (2, 'second', NULL);",
    )
    .unwrap();
    db
}

fn dump(db: &Database) -> Vec<(i64, String, Option<Vec<u8>>)> {
    let mut query = Statement::new(db, "SELECT id, value, data FROM backup_test ORDER BY id").unwrap();
    query
        .rows()
        .map(|row| row.and_then(|r| r.get_columns()))
        .collect::<sqlite_scope::Result<_>>()
        .unwrap()
}

#[test]
fn test_backup_copies_everything_in_one_step() {
    let src = populated();
    let dest = Database::open_in_memory().unwrap();
    {
        let mut backup = Backup::new_main(&dest, &src).unwrap();
        assert_eq!(backup.execute_step(-1).unwrap(), DONE);
        assert_eq!(backup.remaining_page_count(), 0);
    }
    assert_eq!(dump(&dest), dump(&src));
}

#[test]
fn test_backup_to_file_and_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.db");
    let path = path.to_str().unwrap();
    let src = populated();
    {
        let dest = Database::open(path, OPEN_READWRITE | OPEN_CREATE).unwrap();
        let mut backup = Backup::new(&dest, "main", &src, "main").unwrap();
        assert_eq!(backup.execute_step(-1).unwrap(), DONE);
    }
    assert!(Database::is_unencrypted(path).unwrap());

    let restored = Database::open_in_memory().unwrap();
    let from_file = Database::open(path, OPEN_READONLY).unwrap();
    let mut backup = Backup::new_main(&restored, &from_file).unwrap();
    assert_eq!(backup.execute_step(-1).unwrap(), DONE);
    drop(backup);
    assert_eq!(dump(&restored), dump(&src));
}

#[test]
fn test_backup_into_read_only_destination_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("readonly.db");
    let path = path.to_str().unwrap();
    {
        let db = Database::open(path, OPEN_READWRITE | OPEN_CREATE).unwrap();
        db.exec("CREATE TABLE placeholder (id INTEGER)").unwrap();
    }
    let src = populated();
    let dest = Database::open(path, OPEN_READONLY).unwrap();
    let mut backup = Backup::new_main(&dest, &src).unwrap();
    let err = backup.execute_step(-1).unwrap_err();
    assert_eq!(err.code(), READONLY);
    assert_eq!(err.code_str().as_deref(), Some("attempt to write a readonly database"));
}

#[test]
fn test_busy_timeout_under_lock_contention() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("locked.db");
    let options = OpenOptions::new(path.to_str().unwrap()).mode(OpenMode::Create).busy_timeout_ms(50);

    let writer = options.open().unwrap();
    writer.exec("CREATE TABLE t (v INTEGER)").unwrap();
    let other = options.open().unwrap();

    writer.exec("BEGIN EXCLUSIVE").unwrap();
    writer.exec("INSERT INTO t VALUES (1)").unwrap();

    let err = other.exec("INSERT INTO t VALUES (2)").unwrap_err();
    assert_eq!(err.code(), sqlite_scope::BUSY);

    writer.exec("COMMIT").unwrap();
    assert_eq!(other.exec("INSERT INTO t VALUES (2)").unwrap(), 1);
    assert_eq!(other.exec_and_get("SELECT sum(v) FROM t").unwrap().get_int().unwrap(), 3);
}

#[test]
fn test_views_do_not_outlive_their_row() {
    let db = populated();
    let mut query = Statement::new(&db, "SELECT id, value FROM backup_test ORDER BY id").unwrap();
    assert!(query.execute_step().unwrap());
    let row = query.row().unwrap();
    let value = row.at_name("value").unwrap();
    let columns = row.columns();
    assert_eq!(value.get_text().unwrap(), "first");

    assert!(query.execute_step().unwrap());
    assert!(matches!(value.get_text(), Err(Error::StaleRow { .. })));
    assert!(matches!(row.at(0), Err(Error::StaleRow { .. })));
    for column in columns {
        assert!(column.get_value().is_err());
    }

    drop(query);
    assert!(matches!(value.get_text(), Err(Error::StatementExpired)));
    assert!(matches!(row.at(0), Err(Error::StatementExpired)));
}

#[test]
fn test_retained_column_outlives_statement() {
    let db = populated();
    let column = db.exec_and_get("SELECT value FROM backup_test WHERE id = 2").unwrap();
    let copy = column.clone();
    drop(column);
    assert_eq!(copy.get_text().unwrap(), "second");
    assert_eq!(copy.origin_name().unwrap().as_deref(), Some("value"));
}

#[test]
fn test_savepoints_on_file_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("savepoints.db");
    let path = path.to_str().unwrap();
    {
        let db = Database::open(path, OPEN_READWRITE | OPEN_CREATE).unwrap();
        db.exec("CREATE TABLE t (v TEXT)").unwrap();

        let mut outer = Savepoint::new(&db, "outer").unwrap();
        db.exec("INSERT INTO t VALUES ('outer')").unwrap();
        {
            let mut inner = Savepoint::new(&db, "inner \"quoted\"").unwrap();
            db.exec("INSERT INTO t VALUES ('inner')").unwrap();
            inner.rollback_to().unwrap();
            db.exec("INSERT INTO t VALUES ('retried')").unwrap();
            inner.release().unwrap();
        }
        {
            let _discarded = Savepoint::new(&db, "discarded").unwrap();
            db.exec("INSERT INTO t VALUES ('discarded')").unwrap();
        }
        outer.release().unwrap();
    }

    let db = Database::open(path, OPEN_READONLY).unwrap();
    let mut query = Statement::new(&db, "SELECT v FROM t ORDER BY rowid").unwrap();
    let values: Vec<String> = query
        .rows()
        .map(|row| row.and_then(|r| r.get(0)))
        .collect::<sqlite_scope::Result<_>>()
        .unwrap();
    assert_eq!(values, ["outer", "retried"]);
}

#[test]
fn test_database_moves_to_another_thread() {
    let db = populated();
    let handle = std::thread::spawn(move || dump(&db).len());
    assert_eq!(handle.join().unwrap(), 2);
}
