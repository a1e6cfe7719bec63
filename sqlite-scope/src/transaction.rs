///
/// RAII transaction guard.
///
/// BEGIN is issued on construction and COMMIT by an explicit `commit()`.
/// A transaction that is dropped without being committed is rolled back;
/// a failing rollback at that point is logged and otherwise ignored.
///

use crate::Database;
use crate::errors::{Error, Result};

/// Locking behavior of BEGIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionBehavior {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionBehavior {
    fn begin_sql(self) -> &'static str {
        match self {
            TransactionBehavior::Deferred => "BEGIN DEFERRED",
            TransactionBehavior::Immediate => "BEGIN IMMEDIATE",
            TransactionBehavior::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

#[derive(Debug)]
pub struct Transaction<'db> {
    database: &'db Database,
    committed: bool,
}

impl<'db> Transaction<'db> {
    pub fn new(database: &'db Database) -> Result<Self> {
        Self::with_behavior(database, TransactionBehavior::Deferred)
    }

    pub fn with_behavior(database: &'db Database, behavior: TransactionBehavior) -> Result<Self> {
        database.exec(behavior.begin_sql())?;
        tracing::debug!(?behavior, "began transaction");
        Ok(Self {
            database,
            committed: false,
        })
    }

    pub fn database(&self) -> &'db Database {
        self.database
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Commits the transaction. Only the first call has an effect.
    pub fn commit(&mut self) -> Result<()> {
        if self.committed {
            return Err(Error::AlreadyCommitted);
        }
        self.database.exec("COMMIT")?;
        self.committed = true;
        tracing::debug!("committed transaction");
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.database.exec("ROLLBACK") {
            Ok(_) => tracing::debug!("rolled back transaction"),
            Err(err) => tracing::warn!(error = %err, "rollback of uncommitted transaction failed"),
        }
    }
}
