///
/// Column view over the current result row of a prepared statement.
///
/// A `Column` is a lightweight, cloneable (handle, column index, row) triple.
/// It holds a weak reference to the statement handle and remembers which
/// step of the statement it was created for; every read checks both, so a
/// column read after its statement was dropped fails with
/// `StatementExpired`, and a column read after the statement stepped or was
/// reset fails with `StaleRow`.
///
/// Getters forward to the native `sqlite3_column_*` accessors, so SQLite's
/// implicit conversions apply verbatim (reading a TEXT value with
/// `get_int` parses its numeric prefix, reading an INTEGER with `get_text`
/// formats it, and so on). Text and blob getters copy the bytes out of the
/// engine's row buffer.
///
/// `get_type` is only meaningful before any other getter is called on the
/// same value: a conversion performed by a typed getter can change what the
/// engine reports afterwards. Call `get_type` (or `is_null`, `is_text`, ...)
/// first when the dynamic type matters.
///

use std::ffi::c_int;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use rusqlite::ffi;

use crate::Database;
use crate::consts::ColumnType;
use crate::cstr::optional_text;
use crate::errors::{Error, Result};
use crate::handle::{RowStamp, StatementHandle};
use crate::value::Value;

#[derive(Clone)]
pub struct Column<'db> {
    handle: Weak<StatementHandle>,
    anchor: Option<Rc<StatementHandle>>,
    index: i32,
    stamp: RowStamp,
    _db: PhantomData<&'db Database>,
}

impl<'db> Column<'db> {
    pub(crate) fn new(handle: &Rc<StatementHandle>, index: i32) -> Self {
        Self::at_row(Rc::downgrade(handle), index, handle.stamp())
    }

    pub(crate) fn at_row(handle: Weak<StatementHandle>, index: i32, stamp: RowStamp) -> Self {
        Self {
            handle,
            anchor: None,
            index,
            stamp,
            _db: PhantomData,
        }
    }

    /// Keeps the statement alive for as long as this column (or a clone of
    /// it) exists. Used for one-shot queries whose statement is a temporary.
    pub(crate) fn retained(mut self, handle: Rc<StatementHandle>) -> Self {
        self.anchor = Some(handle);
        self
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    /// Statement step this column was created for (1 for the first row).
    pub fn row(&self) -> usize {
        self.stamp.step
    }

    fn statement(&self) -> Result<Rc<StatementHandle>> {
        self.handle.upgrade().ok_or(Error::StatementExpired)
    }

    fn current(&self) -> Result<Rc<StatementHandle>> {
        let handle = self.statement()?;
        handle.check_current(self.stamp)?;
        Ok(handle)
    }

    fn read<T>(&self, f: impl FnOnce(*mut ffi::sqlite3_stmt, c_int) -> T) -> Result<T> {
        let handle = self.current()?;
        Ok(f(handle.as_ptr(), self.index))
    }

    /// Name assigned to this result column, alias included.
    pub fn name(&self) -> Result<String> {
        let handle = self.statement()?;
        let name = unsafe { ffi::sqlite3_column_name(handle.as_ptr(), self.index) };
        Ok(optional_text(name).unwrap_or_default())
    }

    /// Name of the table column this result column comes from, if any.
    pub fn origin_name(&self) -> Result<Option<String>> {
        let handle = self.statement()?;
        let name = unsafe { ffi::sqlite3_column_origin_name(handle.as_ptr(), self.index) };
        Ok(optional_text(name))
    }

    /// Type declared in the table definition, not the dynamic type of the value.
    pub fn declared_type(&self) -> Result<String> {
        let handle = self.statement()?;
        let decl = unsafe { ffi::sqlite3_column_decltype(handle.as_ptr(), self.index) };
        optional_text(decl).ok_or(Error::UnknownDeclaredType(self.index))
    }

    pub fn get_int(&self) -> Result<i32> {
        self.read(|stmt, i| unsafe { ffi::sqlite3_column_int(stmt, i) })
    }

    /// Read as 64-bit and truncated, matching how unsigned values are bound.
    pub fn get_uint(&self) -> Result<u32> {
        Ok(self.get_int64()? as u32)
    }

    pub fn get_int64(&self) -> Result<i64> {
        self.read(|stmt, i| unsafe { ffi::sqlite3_column_int64(stmt, i) })
    }

    pub fn get_double(&self) -> Result<f64> {
        self.read(|stmt, i| unsafe { ffi::sqlite3_column_double(stmt, i) })
    }

    /// Text value of the column; NULL reads as an empty string.
    pub fn get_text(&self) -> Result<String> {
        self.get_text_or("")
    }

    /// Text value of the column, or `default` when the value is NULL.
    pub fn get_text_or(&self, default: &str) -> Result<String> {
        self.read(|stmt, i| unsafe {
            let text = ffi::sqlite3_column_text(stmt, i);
            if text.is_null() {
                return default.to_string();
            }
            let len = ffi::sqlite3_column_bytes(stmt, i).max(0) as usize;
            let bytes = std::slice::from_raw_parts(text, len);
            String::from_utf8_lossy(bytes).into_owned()
        })
    }

    /// Blob value of the column; NULL and zero-length values read as empty.
    pub fn get_blob(&self) -> Result<Vec<u8>> {
        self.read(|stmt, i| unsafe {
            let blob = ffi::sqlite3_column_blob(stmt, i);
            let len = ffi::sqlite3_column_bytes(stmt, i).max(0) as usize;
            if blob.is_null() || len == 0 {
                return Vec::new();
            }
            std::slice::from_raw_parts(blob.cast::<u8>(), len).to_vec()
        })
    }

    /// TEXT or BLOB value as a string, embedded NUL bytes included.
    pub fn get_string(&self) -> Result<String> {
        Ok(String::from_utf8(self.get_blob()?)?)
    }

    /// Detached copy of the value, typed by the column's dynamic type.
    pub fn get_value(&self) -> Result<Value> {
        Ok(match self.get_type()? {
            ColumnType::Null => Value::Null,
            ColumnType::Integer => Value::Integer(self.get_int64()?),
            ColumnType::Float => Value::Real(self.get_double()?),
            ColumnType::Text => Value::Text(self.get_text()?),
            ColumnType::Blob => Value::Blob(self.get_blob()?),
        })
    }

    /// Dynamic type of the value, meaningful only before any conversion.
    pub fn get_type(&self) -> Result<ColumnType> {
        self.read(|stmt, i| ColumnType::from_raw(unsafe { ffi::sqlite3_column_type(stmt, i) }))
    }

    pub fn is_integer(&self) -> Result<bool> {
        Ok(self.get_type()? == ColumnType::Integer)
    }

    pub fn is_float(&self) -> Result<bool> {
        Ok(self.get_type()? == ColumnType::Float)
    }

    pub fn is_text(&self) -> Result<bool> {
        Ok(self.get_type()? == ColumnType::Text)
    }

    pub fn is_blob(&self) -> Result<bool> {
        Ok(self.get_type()? == ColumnType::Blob)
    }

    pub fn is_null(&self) -> Result<bool> {
        Ok(self.get_type()? == ColumnType::Null)
    }

    /// Size in bytes of the UTF-8 text or blob, 0 for NULL.
    ///
    /// Numeric values are converted to text by the engine to compute this.
    pub fn get_bytes(&self) -> Result<i32> {
        self.read(|stmt, i| unsafe { ffi::sqlite3_column_bytes(stmt, i) })
    }

    /// Size in bytes of the UTF-16 text representation, 0 for NULL.
    pub fn get_bytes16(&self) -> Result<i32> {
        self.read(|stmt, i| unsafe { ffi::sqlite3_column_bytes16(stmt, i) })
    }

    pub fn size(&self) -> Result<i32> {
        self.get_bytes()
    }

    pub fn get<T: FromColumn>(&self) -> Result<T> {
        T::from_column(self)
    }
}

impl fmt::Debug for Column<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("index", &self.index)
            .field("row", &self.stamp.step)
            .field("retained", &self.anchor.is_some())
            .finish()
    }
}

impl fmt::Display for Column<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.get_text().map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// Types that can be read out of a `Column`.
pub trait FromColumn: Sized {
    fn from_column(column: &Column<'_>) -> Result<Self>;
}

impl FromColumn for i32 {
    fn from_column(column: &Column<'_>) -> Result<Self> {
        column.get_int()
    }
}

impl FromColumn for u32 {
    fn from_column(column: &Column<'_>) -> Result<Self> {
        column.get_uint()
    }
}

impl FromColumn for i64 {
    fn from_column(column: &Column<'_>) -> Result<Self> {
        column.get_int64()
    }
}

impl FromColumn for bool {
    fn from_column(column: &Column<'_>) -> Result<Self> {
        Ok(column.get_int64()? != 0)
    }
}

impl FromColumn for f64 {
    fn from_column(column: &Column<'_>) -> Result<Self> {
        column.get_double()
    }
}

impl FromColumn for String {
    fn from_column(column: &Column<'_>) -> Result<Self> {
        column.get_string()
    }
}

impl FromColumn for Vec<u8> {
    fn from_column(column: &Column<'_>) -> Result<Self> {
        column.get_blob()
    }
}

impl FromColumn for Value {
    fn from_column(column: &Column<'_>) -> Result<Self> {
        column.get_value()
    }
}

/// NULL reads as `None`; the type check happens before any conversion.
impl<T: FromColumn> FromColumn for Option<T> {
    fn from_column(column: &Column<'_>) -> Result<Self> {
        if column.is_null()? {
            Ok(None)
        } else {
            T::from_column(column).map(Some)
        }
    }
}

macro_rules! impl_try_from_column {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TryFrom<&Column<'_>> for $ty {
                type Error = Error;

                fn try_from(column: &Column<'_>) -> Result<Self> {
                    <$ty as FromColumn>::from_column(column)
                }
            }
        )*
    };
}

impl_try_from_column!(i32, u32, i64, f64, String, Vec<u8>, Value);
