///
/// Database connection.
///
/// `Database` owns one native connection. It is opened on construction and
/// closed when dropped. Every `Statement` borrows the `Database` it was
/// prepared on, so the borrow checker guarantees that no statement (and no
/// column or row view) outlives the connection.
///
/// A connection may be moved to another thread but not shared between
/// threads.
///

use std::ffi::{c_char, CString};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::ptr::{self, NonNull};

use rusqlite::ffi;

use crate::column::Column;
use crate::config::OpenOptions;
use crate::consts::{OPEN_READWRITE, OK};
use crate::cstr::{optional_text, text_or_empty};
use crate::errors::{self, Error, Result};
use crate::function::{self, Aggregate};
use crate::statement::Statement;
use crate::value::{ToParam, Value};

/// First 16 bytes of every unencrypted SQLite database file.
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

pub struct Database {
    connection: NonNull<ffi::sqlite3>,
    filename: String,
}

// The connection is only ever used through `&Database`, and `Database` is
// not `Sync`, so at most one thread touches it at a time.
unsafe impl Send for Database {}

impl Database {
    /// Opens `path` (a file name, a `file:` URI or `:memory:`) with the given
    /// `OPEN_*` flags.
    pub fn open(path: &str, flags: i32) -> Result<Self> {
        Self::open_with(path, flags, 0, None)
    }

    /// Opens `path`, applies a busy timeout if `busy_timeout_ms` is positive,
    /// and uses the named VFS module when given.
    pub fn open_with(path: &str, flags: i32, busy_timeout_ms: i32, vfs: Option<&str>) -> Result<Self> {
        let c_path = CString::new(path)?;
        let c_vfs = vfs.map(CString::new).transpose()?;

        let mut raw = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_open_v2(
                c_path.as_ptr(),
                &mut raw,
                flags,
                c_vfs.as_ref().map_or(ptr::null(), |v| v.as_ptr()),
            )
        };
        if rc != OK {
            let err = Error::from_connection(raw, rc);
            unsafe {
                ffi::sqlite3_close(raw);
            }
            tracing::debug!(path, flags, error = %err, "failed to open database");
            return Err(err);
        }
        let connection = NonNull::new(raw).ok_or_else(|| Error::from_code(ffi::SQLITE_NOMEM))?;

        let database = Self {
            connection,
            filename: path.to_string(),
        };
        tracing::debug!(path, flags, "opened database");

        if busy_timeout_ms > 0 {
            database.set_busy_timeout(busy_timeout_ms)?;
        }
        Ok(database)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:", OPEN_READWRITE)
    }

    pub fn from_options(options: &OpenOptions) -> Result<Self> {
        Self::open_with(
            options.target(),
            options.flags(),
            options.busy_timeout_ms,
            options.vfs.as_deref(),
        )
    }

    /// Raw connection pointer, for calls this crate does not wrap.
    pub fn handle(&self) -> *mut ffi::sqlite3 {
        self.connection.as_ptr()
    }

    /// Path or URI the connection was opened with.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Sets how long a statement waits on a locked database before failing
    /// with `SQLITE_BUSY`. 0 disables waiting.
    pub fn set_busy_timeout(&self, timeout_ms: i32) -> Result<()> {
        let rc = unsafe { ffi::sqlite3_busy_timeout(self.handle(), timeout_ms) };
        self.check(rc)
    }

    /// Runs one or more `;`-separated statements that return no rows.
    ///
    /// Returns `changes()` afterwards, i.e. the rows modified by the last
    /// INSERT, UPDATE or DELETE on this connection. A batch made only of DDL
    /// reports whatever the previous DML statement left behind.
    pub fn exec(&self, queries: &str) -> Result<i32> {
        let c_queries = CString::new(queries)?;
        let rc = unsafe {
            ffi::sqlite3_exec(
                self.handle(),
                c_queries.as_ptr(),
                None,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        self.check(rc)?;
        Ok(self.changes())
    }

    /// Runs `query` and returns the first column of its first row.
    ///
    /// The returned column keeps its statement alive on its own.
    pub fn exec_and_get(&self, query: &str) -> Result<Column<'_>> {
        let mut statement = Statement::new(self, query)?;
        if !statement.execute_step()? {
            return Err(Error::NoRow);
        }
        let column = statement.get_column(0)?;
        Ok(column.retained(statement.shared_handle()))
    }

    /// Whether a table with exactly this (case-sensitive) name exists.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let mut query = Statement::new(
            self,
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?",
        )?;
        query.bind(1, table)?;
        query.execute_step()?;
        Ok(query.get_column(0)?.get_int()? == 1)
    }

    pub fn prepare(&self, query: &str) -> Result<Statement<'_>> {
        Statement::new(self, query)
    }

    /// Prepares `query` once and runs it for every parameter set.
    ///
    /// Returns the total number of rows changed.
    pub fn execute_many(&self, query: &str, params: &[&[&dyn ToParam]]) -> Result<i32> {
        let mut statement = Statement::new(self, query)?;
        let mut changed = 0;
        for values in params {
            statement.reset()?;
            statement.clear_bindings()?;
            statement.bind_all(values)?;
            changed += statement.exec()?;
        }
        Ok(changed)
    }

    /// Registers a scalar SQL function backed by `function`.
    ///
    /// `n_args` of -1 accepts any number of arguments. Deterministic
    /// functions may be used in indexes and are factored out of loops by the
    /// query planner.
    pub fn create_function<F>(&self, name: &str, n_args: i32, deterministic: bool, function: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + 'static,
    {
        function::create_scalar(self.handle(), name, n_args, deterministic, function)
    }

    /// Registers an aggregate SQL function backed by `aggregate`.
    pub fn create_aggregate<A: Aggregate>(
        &self,
        name: &str,
        n_args: i32,
        deterministic: bool,
        aggregate: A,
    ) -> Result<()> {
        function::create_aggregate(self.handle(), name, n_args, deterministic, aggregate)
    }

    /// Loads a run-time extension library.
    ///
    /// `entry_point` defaults to the name SQLite derives from the file name.
    /// Extension loading stays enabled on the connection afterwards.
    pub fn load_extension(&self, path: &str, entry_point: Option<&str>) -> Result<()> {
        let c_path = CString::new(path)?;
        let c_entry = entry_point.map(CString::new).transpose()?;

        self.check(unsafe { ffi::sqlite3_enable_load_extension(self.handle(), 1) })?;

        let mut message: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_load_extension(
                self.handle(),
                c_path.as_ptr(),
                c_entry.as_ref().map_or(ptr::null(), |e| e.as_ptr()),
                &mut message,
            )
        };
        if rc != OK {
            let detail = optional_text(message);
            unsafe {
                ffi::sqlite3_free(message.cast());
            }
            let message = detail.unwrap_or_else(|| self.error_msg());
            tracing::debug!(path, error = %message, "failed to load extension");
            return Err(Error::Sqlite {
                message,
                code: rc,
                extended_code: self.extended_error_code(),
            });
        }
        tracing::debug!(path, "loaded extension");
        Ok(())
    }

    /// Row id of the most recent successful INSERT on this connection.
    pub fn last_insert_rowid(&self) -> i64 {
        unsafe { ffi::sqlite3_last_insert_rowid(self.handle()) }
    }

    /// Rows modified by the most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> i32 {
        unsafe { ffi::sqlite3_changes(self.handle()) }
    }

    /// Rows modified since the connection was opened.
    pub fn total_changes(&self) -> i32 {
        unsafe { ffi::sqlite3_total_changes(self.handle()) }
    }

    pub fn error_code(&self) -> i32 {
        unsafe { ffi::sqlite3_errcode(self.handle()) }
    }

    pub fn extended_error_code(&self) -> i32 {
        unsafe { ffi::sqlite3_extended_errcode(self.handle()) }
    }

    pub fn error_msg(&self) -> String {
        text_or_empty(unsafe { ffi::sqlite3_errmsg(self.handle()) })
    }

    /// Whether the file at `path` starts with the plain SQLite header.
    ///
    /// Files shorter than the header are reported as not unencrypted.
    pub fn is_unencrypted(path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::new("Could not open database, the path is empty"));
        }
        let mut header = [0u8; 16];
        let mut file = File::open(path)?;
        match file.read_exact(&mut header) {
            Ok(()) => Ok(&header == SQLITE_HEADER),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn check(&self, rc: i32) -> Result<()> {
        errors::check(self.handle(), rc)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let rc = unsafe { ffi::sqlite3_close(self.handle()) };
        if rc != OK {
            let err = Error::from_connection(self.handle(), rc);
            tracing::error!(path = %self.filename, error = %err, "database closed with unfinalized statements");
            debug_assert_eq!(rc, OK, "database is still in use: {err}");
        } else {
            tracing::debug!(path = %self.filename, "closed database");
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}
