///
/// Process-wide constants mirroring the SQLite C API.
///
/// Open flags are passed verbatim to `sqlite3_open_v2`, result codes are
/// what `Statement::try_execute_step` and `Backup::execute_step` return, and
/// the type tags are the raw values behind `ColumnType`.
///

use std::fmt;

use rusqlite::ffi;

pub const OPEN_READONLY: i32 = ffi::SQLITE_OPEN_READONLY;
pub const OPEN_READWRITE: i32 = ffi::SQLITE_OPEN_READWRITE;
pub const OPEN_CREATE: i32 = ffi::SQLITE_OPEN_CREATE;
pub const OPEN_URI: i32 = ffi::SQLITE_OPEN_URI;
pub const OPEN_MEMORY: i32 = ffi::SQLITE_OPEN_MEMORY;
pub const OPEN_NOMUTEX: i32 = ffi::SQLITE_OPEN_NOMUTEX;

pub const OK: i32 = ffi::SQLITE_OK;
pub const ERROR: i32 = ffi::SQLITE_ERROR;
pub const BUSY: i32 = ffi::SQLITE_BUSY;
pub const LOCKED: i32 = ffi::SQLITE_LOCKED;
pub const READONLY: i32 = ffi::SQLITE_READONLY;
pub const MISUSE: i32 = ffi::SQLITE_MISUSE;
pub const RANGE: i32 = ffi::SQLITE_RANGE;
pub const ROW: i32 = ffi::SQLITE_ROW;
pub const DONE: i32 = ffi::SQLITE_DONE;

pub const INTEGER: i32 = ffi::SQLITE_INTEGER;
pub const FLOAT: i32 = ffi::SQLITE_FLOAT;
pub const TEXT: i32 = ffi::SQLITE_TEXT;
pub const BLOB: i32 = ffi::SQLITE_BLOB;
pub const NULL: i32 = ffi::SQLITE_NULL;

/// Compile-time version number of the linked SQLite library.
pub const VERSION_NUMBER: i32 = ffi::SQLITE_VERSION_NUMBER;

/// Dynamic type of a value in a result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Blob,
    Null,
}

impl ColumnType {
    pub fn from_raw(raw: i32) -> ColumnType {
        match raw {
            INTEGER => ColumnType::Integer,
            FLOAT => ColumnType::Float,
            TEXT => ColumnType::Text,
            BLOB => ColumnType::Blob,
            _ => ColumnType::Null,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            ColumnType::Integer => INTEGER,
            ColumnType::Float => FLOAT,
            ColumnType::Text => TEXT,
            ColumnType::Blob => BLOB,
            ColumnType::Null => NULL,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
            ColumnType::Null => "NULL",
        };
        f.write_str(name)
    }
}

/// Runtime version string of the linked SQLite library.
pub fn lib_version() -> String {
    unsafe { crate::cstr::text_or_empty(ffi::sqlite3_libversion()) }
}

/// Runtime version number of the linked SQLite library.
pub fn lib_version_number() -> i32 {
    unsafe { ffi::sqlite3_libversion_number() }
}
