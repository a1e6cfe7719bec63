///
/// Shared prepared-statement handle.
///
/// One `StatementHandle` owns one native `sqlite3_stmt`. It is held behind
/// an `Rc` by its `Statement`; `Column` and `Row` views keep `Weak`
/// references and upgrade them on every read, so a view never keeps a
/// statement alive and a finalized statement is never read through.
///
/// The handle also carries the counters used to detect stale views: every
/// step increments the step counter, every reset sets it back to zero and
/// starts a new run. A view remembers the `RowStamp` (run, step) of the row
/// it was created for.
///

use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::{c_char, c_int};
use std::ptr::{self, NonNull};

use rusqlite::ffi;

use crate::cstr::text_or_empty;
use crate::errors::{Error, Result};

/// Identifies one row of one run of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RowStamp {
    pub(crate) run: u64,
    pub(crate) step: usize,
}

pub struct StatementHandle {
    connection: *mut ffi::sqlite3,
    statement: NonNull<ffi::sqlite3_stmt>,
    run: Cell<u64>,
    current_step: Cell<usize>,
    has_row: Cell<bool>,
    column_count: i32,
    column_names: HashMap<String, i32>,
}

impl StatementHandle {
    pub(crate) fn prepare(connection: *mut ffi::sqlite3, query: &str) -> Result<Self> {
        if connection.is_null() {
            return Err(Error::new(
                "Can't create statement without valid database connection",
            ));
        }
        let len = c_int::try_from(query.len())
            .map_err(|_| Error::from_code(ffi::SQLITE_TOOBIG))?;

        let mut raw = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                connection,
                query.as_ptr().cast::<c_char>(),
                len,
                &mut raw,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(Error::from_connection(connection, rc));
        }
        let Some(statement) = NonNull::new(raw) else {
            return Err(Error::EmptyStatement);
        };

        let column_count = unsafe { ffi::sqlite3_column_count(statement.as_ptr()) };
        let mut column_names = HashMap::with_capacity(column_count.max(0) as usize);
        for index in 0..column_count {
            let name = text_or_empty(unsafe { ffi::sqlite3_column_name(statement.as_ptr(), index) });
            column_names.entry(name).or_insert(index);
        }

        tracing::trace!(sql = query, columns = column_count, "prepared statement");

        Ok(Self {
            connection,
            statement,
            run: Cell::new(0),
            current_step: Cell::new(0),
            has_row: Cell::new(false),
            column_count,
            column_names,
        })
    }

    /// Rewinds the statement. Bindings are left untouched.
    pub(crate) fn reset(&self) -> c_int {
        self.run.set(self.run.get() + 1);
        self.current_step.set(0);
        self.has_row.set(false);
        unsafe { ffi::sqlite3_reset(self.statement.as_ptr()) }
    }

    pub(crate) fn step(&self) -> c_int {
        self.current_step.set(self.current_step.get() + 1);
        let rc = unsafe { ffi::sqlite3_step(self.statement.as_ptr()) };
        self.has_row.set(rc == ffi::SQLITE_ROW);
        rc
    }

    /// Raw statement pointer, for calls this crate does not wrap.
    pub fn as_ptr(&self) -> *mut ffi::sqlite3_stmt {
        self.statement.as_ptr()
    }

    pub(crate) fn connection(&self) -> *mut ffi::sqlite3 {
        self.connection
    }

    pub fn current_step(&self) -> usize {
        self.current_step.get()
    }

    pub(crate) fn stamp(&self) -> RowStamp {
        RowStamp {
            run: self.run.get(),
            step: self.current_step.get(),
        }
    }

    pub fn has_row(&self) -> bool {
        self.has_row.get()
    }

    pub fn column_count(&self) -> i32 {
        self.column_count
    }

    pub fn column_names(&self) -> &HashMap<String, i32> {
        &self.column_names
    }

    pub fn column_index(&self, name: &str) -> Result<i32> {
        self.column_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    pub(crate) fn check_index(&self, index: i32) -> Result<()> {
        if index < 0 || index >= self.column_count {
            return Err(Error::ColumnIndexOutOfRange {
                index,
                count: self.column_count,
            });
        }
        Ok(())
    }

    /// Fails unless `stamp` is the row the statement currently points at.
    pub(crate) fn check_current(&self, stamp: RowStamp) -> Result<()> {
        let current = self.current_step.get();
        if stamp.run != self.run.get() || stamp.step != current || !self.has_row.get() {
            return Err(Error::StaleRow {
                row: stamp.step,
                current,
            });
        }
        Ok(())
    }

    pub(crate) fn error(&self, code: c_int) -> Error {
        Error::from_connection(self.connection, code)
    }
}

impl Drop for StatementHandle {
    fn drop(&mut self) {
        unsafe {
            ffi::sqlite3_finalize(self.statement.as_ptr());
        }
        tracing::trace!("finalized statement");
    }
}

impl std::fmt::Debug for StatementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementHandle")
            .field("run", &self.run.get())
            .field("current_step", &self.current_step.get())
            .field("has_row", &self.has_row.get())
            .field("column_count", &self.column_count)
            .finish()
    }
}
