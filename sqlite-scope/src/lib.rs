///
/// sqlite-scope: scope-bound SQLite access
///
/// A thin wrapper over the SQLite C API (the bundled library shipped with
/// rusqlite's `ffi` module). Every native object is owned by a Rust value
/// and released when that value is dropped, and every native failure is
/// turned into an `Error` carrying the SQLite result codes.
///
/// Architecture:
/// - `Database` owns a connection. `Statement<'db>` borrows it, so the
///   connection outlives every statement prepared on it.
/// - A statement's native handle lives in a shared `StatementHandle`.
///   `Column` and `Row` views hold weak references plus the step they were
///   taken at, and refuse to read once the statement is gone or has moved.
/// - `Transaction`, `Savepoint` and `Backup` are RAII guards: an uncommitted
///   transaction or unreleased savepoint is rolled back when dropped, and a
///   backup is finished.
/// - Scalar and aggregate SQL functions are Rust closures / trait objects
///   registered on the connection.
///
/// Usage:
/// ```no_run
/// use sqlite_scope::{Database, Statement, Transaction, OPEN_CREATE, OPEN_READWRITE};
///
/// let db = Database::open("app.db", OPEN_READWRITE | OPEN_CREATE)?;
/// db.exec("CREATE TABLE IF NOT EXISTS people (id INTEGER PRIMARY KEY, name TEXT)")?;
///
/// let mut transaction = Transaction::new(&db)?;
/// let mut insert = Statement::new(&db, "INSERT INTO people (name) VALUES (:name)")?;
/// insert.bind_by_name(":name", "ada")?;
/// insert.exec()?;
/// transaction.commit()?;
///
/// let mut query = Statement::new(&db, "SELECT id, name FROM people")?;
/// while query.execute_step()? {
///     let (id, name): (i64, String) = query.get_columns()?;
///     println!("{id}: {name}");
/// }
/// # Ok::<(), sqlite_scope::Error>(())
/// ```
///

pub mod backup;
pub mod column;
pub mod config;
pub mod consts;
pub mod database;
pub mod errors;
pub mod function;
pub mod handle;
pub mod row;
pub mod savepoint;
pub mod statement;
pub mod transaction;
pub mod value;

mod cstr;

pub use backup::Backup;
pub use column::{Column, FromColumn};
pub use config::{OpenMode, OpenOptions};
pub use consts::*;
pub use database::Database;
pub use errors::{Error, Result, UNSET_CODE};
pub use function::Aggregate;
pub use handle::StatementHandle;
pub use row::{ColumnIter, FromRow, Row, Rows};
pub use savepoint::Savepoint;
pub use statement::Statement;
pub use transaction::{Transaction, TransactionBehavior};
pub use value::{Null, ParamRef, ToParam, Value};
