///
/// RAII savepoint guard.
///
/// SAVEPOINT is issued on construction. `release()` is the savepoint's
/// commit; `rollback_to()` undoes everything since the savepoint while
/// keeping it open, so it can be retried. A savepoint dropped without being
/// released is rolled back and released.
///
/// Savepoints nest at the SQL level; this guard does not track nesting.
///

use crate::Database;
use crate::errors::{Error, Result};

#[derive(Debug)]
pub struct Savepoint<'db> {
    database: &'db Database,
    name: String,
    quoted: String,
    released: bool,
}

impl<'db> Savepoint<'db> {
    pub fn new(database: &'db Database, name: &str) -> Result<Self> {
        let quoted = quote_identifier(name);
        database.exec(&format!("SAVEPOINT {quoted}"))?;
        tracing::debug!(name, "opened savepoint");
        Ok(Self {
            database,
            name: name.to_string(),
            quoted,
            released: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Keeps the changes made since the savepoint. Only the first call has
    /// an effect.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(Error::AlreadyReleased(self.name.clone()));
        }
        self.database.exec(&format!("RELEASE SAVEPOINT {}", self.quoted))?;
        self.released = true;
        tracing::debug!(name = %self.name, "released savepoint");
        Ok(())
    }

    /// Undoes the changes made since the savepoint. The savepoint stays open.
    pub fn rollback_to(&mut self) -> Result<()> {
        if self.released {
            return Err(Error::AlreadyReleased(self.name.clone()));
        }
        self.database.exec(&format!("ROLLBACK TO SAVEPOINT {}", self.quoted))?;
        tracing::debug!(name = %self.name, "rolled back to savepoint");
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let outcome = self
            .database
            .exec(&format!("ROLLBACK TO SAVEPOINT {}", self.quoted))
            .and_then(|_| self.database.exec(&format!("RELEASE SAVEPOINT {}", self.quoted)));
        if let Err(err) = outcome {
            tracing::warn!(name = %self.name, error = %err, "rollback of unreleased savepoint failed");
        }
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
