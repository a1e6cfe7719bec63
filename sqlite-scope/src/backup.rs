///
/// Online backup between two open connections.
///
/// A `Backup` copies the pages of one schema of the source connection into
/// one schema of the destination connection, a chunk of pages per
/// `execute_step()` call. Both connections stay borrowed for as long as the
/// backup exists; the native backup is finished when it is dropped.
///

use std::ffi::CString;
use std::marker::PhantomData;
use std::ptr::NonNull;

use rusqlite::ffi;

use crate::Database;
use crate::errors::{Error, Result};

pub struct Backup<'a> {
    backup: NonNull<ffi::sqlite3_backup>,
    _databases: PhantomData<&'a Database>,
}

impl<'a> Backup<'a> {
    /// Prepares a backup of `source_name` on `source` into
    /// `destination_name` on `destination`.
    pub fn new(
        destination: &'a Database,
        destination_name: &str,
        source: &'a Database,
        source_name: &str,
    ) -> Result<Self> {
        let c_destination = CString::new(destination_name)?;
        let c_source = CString::new(source_name)?;
        let raw = unsafe {
            ffi::sqlite3_backup_init(
                destination.handle(),
                c_destination.as_ptr(),
                source.handle(),
                c_source.as_ptr(),
            )
        };
        // Failures are reported on the destination connection.
        let Some(backup) = NonNull::new(raw) else {
            let code = destination.error_code();
            return Err(Error::from_connection(destination.handle(), code));
        };
        tracing::debug!(
            from = %source.filename(),
            to = %destination.filename(),
            source_name,
            destination_name,
            "started backup"
        );
        Ok(Self {
            backup,
            _databases: PhantomData,
        })
    }

    /// Backup of the `main` schema into the `main` schema.
    pub fn new_main(destination: &'a Database, source: &'a Database) -> Result<Self> {
        Self::new(destination, "main", source, "main")
    }

    /// Copies up to `pages` pages, or everything that is left when `pages`
    /// is negative.
    ///
    /// `SQLITE_OK` (more to copy), `SQLITE_DONE`, `SQLITE_BUSY` and
    /// `SQLITE_LOCKED` are returned as-is; the last two mean the step may be
    /// retried later. Any other result is an error.
    pub fn execute_step(&mut self, pages: i32) -> Result<i32> {
        let rc = unsafe { ffi::sqlite3_backup_step(self.backup.as_ptr(), pages) };
        match rc {
            ffi::SQLITE_OK | ffi::SQLITE_DONE | ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => Ok(rc),
            // Only the step result code is reported (sqlite3_errstr), not the destination message.
            _ => Err(Error::from_code(rc)),
        }
    }

    /// Source pages still to copy. Only meaningful after the first
    /// `execute_step()`.
    pub fn remaining_page_count(&self) -> i32 {
        unsafe { ffi::sqlite3_backup_remaining(self.backup.as_ptr()) }
    }

    /// Total source pages. Only meaningful after the first `execute_step()`.
    pub fn total_page_count(&self) -> i32 {
        unsafe { ffi::sqlite3_backup_pagecount(self.backup.as_ptr()) }
    }

    /// Raw backup pointer, for calls this crate does not wrap.
    pub fn as_ptr(&self) -> *mut ffi::sqlite3_backup {
        self.backup.as_ptr()
    }
}

impl Drop for Backup<'_> {
    fn drop(&mut self) {
        let rc = unsafe { ffi::sqlite3_backup_finish(self.backup.as_ptr()) };
        tracing::debug!(rc, "finished backup");
    }
}

impl std::fmt::Debug for Backup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backup").finish_non_exhaustive()
    }
}
