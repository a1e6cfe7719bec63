///
/// Prepared statement: binding, stepping and result access.
///
/// A `Statement` borrows its `Database` and owns the shared statement
/// handle. Its state machine has three states:
///
/// - **Ready** after preparation or `reset()`;
/// - **HasRow** after `execute_step()` returned `true`;
/// - **Done** after a step reported that the query is exhausted.
///
/// Stepping a Done statement without resetting it is an error
/// (`NeedsReset`). `reset()` rewinds to Ready from any state but keeps the
/// parameter bindings; `clear_bindings()` is the separate operation that
/// sets every parameter back to NULL.
///
/// Parameters are copied into the engine by default. The `bind_no_copy*`
/// family hands the engine a pointer to the caller's memory instead; the
/// borrow must outlive the connection borrow, which the signature enforces.
///

use std::ffi::{c_char, c_int, CString};
use std::fmt;
use std::rc::Rc;

use rusqlite::ffi;

use crate::Database;
use crate::column::{Column, FromColumn};
use crate::cstr::optional_text;
use crate::errors::{self, Error, Result};
use crate::handle::StatementHandle;
use crate::row::{FromRow, Row, Rows};
use crate::value::{ParamRef, ToParam};

pub struct Statement<'db> {
    database: &'db Database,
    query: String,
    handle: Rc<StatementHandle>,
    done: bool,
}

impl<'db> Statement<'db> {
    /// Compiles `query` against `database`.
    pub fn new(database: &'db Database, query: &str) -> Result<Self> {
        let handle = StatementHandle::prepare(database.handle(), query)?;
        Ok(Self {
            database,
            query: query.to_string(),
            handle: Rc::new(handle),
            done: false,
        })
    }

    pub fn database(&self) -> &'db Database {
        self.database
    }

    /// SQL text the statement was prepared from.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// SQL text with the current bindings substituted in.
    pub fn expanded_sql(&self) -> Result<String> {
        unsafe {
            let expanded = ffi::sqlite3_expanded_sql(self.as_ptr());
            if expanded.is_null() {
                return Err(Error::from_code(ffi::SQLITE_NOMEM));
            }
            let text = optional_text(expanded).unwrap_or_default();
            ffi::sqlite3_free(expanded.cast());
            Ok(text)
        }
    }

    /// Raw statement pointer, for calls this crate does not wrap.
    pub fn as_ptr(&self) -> *mut ffi::sqlite3_stmt {
        self.handle.as_ptr()
    }

    pub(crate) fn shared_handle(&self) -> Rc<StatementHandle> {
        Rc::clone(&self.handle)
    }

    // Lifecycle

    /// Rewinds to the Ready state. Bindings are kept.
    pub fn reset(&mut self) -> Result<()> {
        let rc = self.try_reset();
        errors::check(self.database.handle(), rc)
    }

    /// Rewinds to the Ready state and returns the native result code.
    pub fn try_reset(&mut self) -> i32 {
        self.done = false;
        self.handle.reset()
    }

    /// Sets every parameter back to NULL. Does not rewind the statement.
    pub fn clear_bindings(&mut self) -> Result<()> {
        let rc = unsafe { ffi::sqlite3_clear_bindings(self.as_ptr()) };
        self.check(rc)
    }

    /// Advances to the next row. Returns `false` once the query is done.
    pub fn execute_step(&mut self) -> Result<bool> {
        if self.done {
            return Err(Error::NeedsReset);
        }
        match self.handle.step() {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => {
                self.done = true;
                Ok(false)
            }
            rc => Err(self.handle.error(rc)),
        }
    }

    /// Same as `execute_step` but hands back the native result code.
    ///
    /// Returns `SQLITE_MISUSE` without stepping when the statement is done.
    pub fn try_execute_step(&mut self) -> i32 {
        if self.done {
            return ffi::SQLITE_MISUSE;
        }
        let rc = self.handle.step();
        if rc == ffi::SQLITE_DONE {
            self.done = true;
        }
        rc
    }

    /// Runs a statement that returns no rows and reports how many rows it
    /// changed.
    pub fn exec(&mut self) -> Result<i32> {
        if self.done {
            return Err(Error::NeedsReset);
        }
        match self.handle.step() {
            ffi::SQLITE_DONE => {
                self.done = true;
                Ok(self.changes())
            }
            ffi::SQLITE_ROW => Err(Error::UnexpectedRow),
            rc => Err(self.handle.error(rc)),
        }
    }

    pub fn has_row(&self) -> bool {
        self.handle.has_row()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    // Binding

    /// Binds `value` to the 1-based parameter `index`, copying it.
    pub fn bind(&mut self, index: i32, value: impl ToParam) -> Result<()> {
        self.bind_param(index, value.to_param(), ffi::SQLITE_TRANSIENT())
    }

    /// Binds `value` to the parameter named `name` (`:id`, `@id`, `$id`, `?1`).
    pub fn bind_by_name(&mut self, name: &str, value: impl ToParam) -> Result<()> {
        let index = self.bind_parameter_index(name)?;
        self.bind(index, value)
    }

    /// Binds text without copying it into the engine.
    pub fn bind_no_copy(&mut self, index: i32, value: &'db str) -> Result<()> {
        self.bind_param(index, ParamRef::Text(value), ffi::SQLITE_STATIC())
    }

    /// Binds a blob without copying it into the engine.
    pub fn bind_no_copy_blob(&mut self, index: i32, value: &'db [u8]) -> Result<()> {
        self.bind_param(index, ParamRef::Blob(value), ffi::SQLITE_STATIC())
    }

    pub fn bind_no_copy_by_name(&mut self, name: &str, value: &'db str) -> Result<()> {
        let index = self.bind_parameter_index(name)?;
        self.bind_no_copy(index, value)
    }

    pub fn bind_no_copy_blob_by_name(&mut self, name: &str, value: &'db [u8]) -> Result<()> {
        let index = self.bind_parameter_index(name)?;
        self.bind_no_copy_blob(index, value)
    }

    /// Binds `values` to parameters `1..=values.len()`.
    pub fn bind_all(&mut self, values: &[&dyn ToParam]) -> Result<()> {
        for (index, value) in (1..).zip(values) {
            self.bind(index, value)?;
        }
        Ok(())
    }

    pub fn bind_parameter_index(&self, name: &str) -> Result<i32> {
        let c_name = CString::new(name)?;
        let index = unsafe { ffi::sqlite3_bind_parameter_index(self.as_ptr(), c_name.as_ptr()) };
        if index == 0 {
            return Err(Error::UnknownParameter(name.to_string()));
        }
        Ok(index)
    }

    pub fn bind_parameter_count(&self) -> i32 {
        unsafe { ffi::sqlite3_bind_parameter_count(self.as_ptr()) }
    }

    fn bind_param(
        &mut self,
        index: i32,
        param: ParamRef<'_>,
        destructor: ffi::sqlite3_destructor_type,
    ) -> Result<()> {
        let stmt = self.as_ptr();
        let rc = unsafe {
            match param {
                ParamRef::Null => ffi::sqlite3_bind_null(stmt, index),
                ParamRef::Int(v) => ffi::sqlite3_bind_int(stmt, index, v),
                ParamRef::Int64(v) => ffi::sqlite3_bind_int64(stmt, index, v),
                ParamRef::Double(v) => ffi::sqlite3_bind_double(stmt, index, v),
                ParamRef::Text(v) => ffi::sqlite3_bind_text64(
                    stmt,
                    index,
                    v.as_ptr().cast::<c_char>(),
                    v.len() as ffi::sqlite3_uint64,
                    destructor,
                    ffi::SQLITE_UTF8 as u8,
                ),
                ParamRef::Blob([]) => ffi::sqlite3_bind_zeroblob(stmt, index, 0),
                ParamRef::Blob(v) => ffi::sqlite3_bind_blob64(
                    stmt,
                    index,
                    v.as_ptr().cast(),
                    v.len() as ffi::sqlite3_uint64,
                    destructor,
                ),
            }
        };
        self.check(rc)
    }

    // Results

    fn check_row(&self) -> Result<()> {
        if !self.handle.has_row() {
            return Err(Error::NoRow);
        }
        Ok(())
    }

    /// Column `index` of the current row.
    pub fn get_column(&self, index: i32) -> Result<Column<'db>> {
        self.check_row()?;
        self.handle.check_index(index)?;
        Ok(Column::new(&self.handle, index))
    }

    /// Column `name` of the current row. Names are case-sensitive.
    pub fn get_column_by_name(&self, name: &str) -> Result<Column<'db>> {
        self.check_row()?;
        let index = self.handle.column_index(name)?;
        Ok(Column::new(&self.handle, index))
    }

    pub fn is_column_null(&self, index: i32) -> Result<bool> {
        self.get_column(index)?.is_null()
    }

    pub fn is_column_null_by_name(&self, name: &str) -> Result<bool> {
        self.get_column_by_name(name)?.is_null()
    }

    pub fn get<T: FromColumn>(&self, index: i32) -> Result<T> {
        self.get_column(index)?.get()
    }

    /// Builds a tuple out of the first columns of the current row.
    pub fn get_columns<T: FromRow>(&self) -> Result<T> {
        self.row()?.get_columns()
    }

    /// View of the current row.
    pub fn row(&self) -> Result<Row<'db>> {
        self.check_row()?;
        Ok(Row::new(&self.handle))
    }

    /// Iterates the result set from the beginning. Restarts the statement.
    pub fn rows(&mut self) -> Rows<'_, 'db> {
        Rows::new(self)
    }

    // Metadata

    pub fn column_count(&self) -> i32 {
        self.handle.column_count()
    }

    pub fn column_index(&self, name: &str) -> Result<i32> {
        self.handle.column_index(name)
    }

    pub fn column_name(&self, index: i32) -> Result<String> {
        self.handle.check_index(index)?;
        let name = unsafe { ffi::sqlite3_column_name(self.as_ptr(), index) };
        Ok(optional_text(name).unwrap_or_default())
    }

    /// Result column names, in order.
    pub fn column_names(&self) -> Result<Vec<String>> {
        (0..self.column_count()).map(|i| self.column_name(i)).collect()
    }

    pub fn column_origin_name(&self, index: i32) -> Result<Option<String>> {
        self.handle.check_index(index)?;
        let name = unsafe { ffi::sqlite3_column_origin_name(self.as_ptr(), index) };
        Ok(optional_text(name))
    }

    /// Declared type of column `index`; errors for expressions.
    pub fn column_declared_type(&self, index: i32) -> Result<String> {
        self.handle.check_index(index)?;
        let decl = unsafe { ffi::sqlite3_column_decltype(self.as_ptr(), index) };
        optional_text(decl).ok_or(Error::UnknownDeclaredType(index))
    }

    // Connection state

    /// Rows changed by the most recent statement on the connection.
    pub fn changes(&self) -> i32 {
        self.database.changes()
    }

    pub fn error_code(&self) -> i32 {
        self.database.error_code()
    }

    pub fn extended_error_code(&self) -> i32 {
        self.database.extended_error_code()
    }

    pub fn error_msg(&self) -> String {
        self.database.error_msg()
    }

    fn check(&self, rc: c_int) -> Result<()> {
        errors::check(self.handle.connection(), rc)
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("query", &self.query)
            .field("has_row", &self.has_row())
            .field("done", &self.done)
            .finish()
    }
}
