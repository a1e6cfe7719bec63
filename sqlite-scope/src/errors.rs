///
/// Error types for the SQLite wrapper.
///
/// Two families of failures share one type:
/// - native failures, carrying the primary and extended SQLite result codes
///   together with the engine's own message;
/// - usage errors (stepping a finished statement, reading a column that is
///   out of range or no longer current, committing twice, ...), which have
///   no native code and report `UNSET_CODE` for both codes.
///

use std::ffi::{c_int, NulError};
use std::string::FromUtf8Error;

use rusqlite::ffi;
use thiserror::Error;

use crate::cstr::text_or_empty;

/// Code reported by errors that did not originate in the native engine.
pub const UNSET_CODE: i32 = -1;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Sqlite {
        message: String,
        code: i32,
        extended_code: i32,
    },

    #[error("No row to get a column from. execute_step() was not called, or returned false.")]
    NoRow,

    #[error("Column index {index} out of range (statement has {count} columns)")]
    ColumnIndexOutOfRange { index: i32, count: i32 },

    #[error("Unknown column name '{0}'")]
    UnknownColumn(String),

    #[error("Unknown parameter name '{0}'")]
    UnknownParameter(String),

    #[error("Could not determine declared type of column {0}")]
    UnknownDeclaredType(i32),

    #[error("Statement needs to be reset before it can be stepped again")]
    NeedsReset,

    #[error("exec() does not expect results. Use execute_step().")]
    UnexpectedRow,

    #[error("SQL text contains no statement")]
    EmptyStatement,

    #[error("Transaction already committed")]
    AlreadyCommitted,

    #[error("Savepoint '{0}' already released")]
    AlreadyReleased(String),

    #[error("Statement was destroyed before its result was read")]
    StatementExpired,

    #[error("Row {row} is no longer current (statement is at step {current})")]
    StaleRow { row: usize, current: usize },

    #[error("{0}")]
    Misuse(String),

    #[error("String contains an interior NUL byte: {0}")]
    Nul(#[from] NulError),

    #[error("Column value is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Usage error with a free-form message and unset codes.
    pub fn new(message: impl Into<String>) -> Self {
        Error::Misuse(message.into())
    }

    /// Native error for `code`, with message and extended code read from the
    /// connection's last-error state.
    pub(crate) fn from_connection(db: *mut ffi::sqlite3, code: c_int) -> Self {
        if db.is_null() {
            return Self::from_code(code);
        }
        let (message, extended_code) = unsafe {
            (
                text_or_empty(ffi::sqlite3_errmsg(db)),
                ffi::sqlite3_extended_errcode(db),
            )
        };
        Error::Sqlite {
            message,
            code,
            extended_code,
        }
    }

    /// Native error for `code` when no connection state applies.
    pub(crate) fn from_code(code: c_int) -> Self {
        let message = unsafe { text_or_empty(ffi::sqlite3_errstr(code)) };
        Error::Sqlite {
            message,
            code,
            extended_code: UNSET_CODE,
        }
    }

    /// Primary SQLite result code, or `UNSET_CODE` for usage errors.
    pub fn code(&self) -> i32 {
        match self {
            Error::Sqlite { code, .. } => *code,
            _ => UNSET_CODE,
        }
    }

    /// Extended SQLite result code, or `UNSET_CODE` when none applies.
    pub fn extended_code(&self) -> i32 {
        match self {
            Error::Sqlite { extended_code, .. } => *extended_code,
            _ => UNSET_CODE,
        }
    }

    /// Description of the SQLite result code, if this is a native error.
    pub fn code_str(&self) -> Option<String> {
        match self {
            Error::Sqlite { code, .. } => Some(unsafe { text_or_empty(ffi::sqlite3_errstr(*code)) }),
            _ => None,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Error::Sqlite { .. })
    }
}

/// Turns a native return code into `Ok(())` or the connection's error.
pub(crate) fn check(db: *mut ffi::sqlite3, code: c_int) -> Result<()> {
    if code == ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(Error::from_connection(db, code))
    }
}
