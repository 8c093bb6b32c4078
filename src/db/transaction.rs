//! Transaction module - transactions and savepoints around a unit of work
//!
//! The unit of work is a closure. Returning `Ok` commits (or releases),
//! returning `Err` rolls back, and the closure's own error is what the caller
//! gets back. A failed rollback is logged, never returned in its place.

use tracing::{debug, warn};
use uuid::Uuid;

use super::Connection;
use crate::error::Error;
use crate::expr::quote_identifier;

/// Lock acquisition mode for `BEGIN`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionMode {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionMode::Deferred => "DEFERRED",
            TransactionMode::Immediate => "IMMEDIATE",
            TransactionMode::Exclusive => "EXCLUSIVE",
        }
    }

    /// Mode from a lowercase name; anything unrecognized is deferred.
    pub fn parse(mode: Option<&str>) -> TransactionMode {
        match mode {
            Some("immediate") => TransactionMode::Immediate,
            Some("exclusive") => TransactionMode::Exclusive,
            _ => TransactionMode::Deferred,
        }
    }
}

impl Connection {
    /// Run `work` inside `BEGIN <mode> TRANSACTION` ... `COMMIT TRANSACTION`.
    ///
    /// Transactions do not nest; use [`Connection::savepoint`] inside one.
    pub fn transaction<T, E, F>(&self, mode: TransactionMode, work: F) -> Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        self.run(&format!("BEGIN {} TRANSACTION", mode.as_str()), &[])?;
        debug!(mode = mode.as_str(), "began transaction");

        match work(self) {
            Ok(value) => match self.run("COMMIT TRANSACTION", &[]) {
                Ok(_) => {
                    debug!("committed transaction");
                    Ok(value)
                }
                Err(err) => {
                    self.rollback_after_failure("ROLLBACK TRANSACTION");
                    Err(err.into())
                }
            },
            Err(err) => {
                self.rollback_after_failure("ROLLBACK TRANSACTION");
                Err(err)
            }
        }
    }

    /// Run `work` inside a savepoint with a generated name.
    pub fn savepoint<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let name = format!("sp_{}", Uuid::new_v4().simple());
        self.savepoint_named(&name, work)
    }

    /// Run `work` inside `SAVEPOINT "<name>"`.
    ///
    /// On success the savepoint is released. On failure, including a failed
    /// release, it is rolled back to and then released, leaving any enclosing
    /// savepoint or transaction active.
    pub fn savepoint_named<T, E, F>(&self, name: &str, work: F) -> Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&Connection) -> Result<T, E>,
    {
        let quoted = quote_identifier(name);
        self.run(&format!("SAVEPOINT {quoted}"), &[])?;
        debug!(name, "created savepoint");

        match work(self) {
            Ok(value) => match self.run(&format!("RELEASE SAVEPOINT {quoted}"), &[]) {
                Ok(_) => {
                    debug!(name, "released savepoint");
                    Ok(value)
                }
                Err(err) => {
                    self.unwind_savepoint(&quoted);
                    Err(err.into())
                }
            },
            Err(err) => {
                self.unwind_savepoint(&quoted);
                Err(err)
            }
        }
    }

    fn unwind_savepoint(&self, quoted: &str) {
        self.rollback_after_failure(&format!("ROLLBACK TO SAVEPOINT {quoted}"));
        self.rollback_after_failure(&format!("RELEASE SAVEPOINT {quoted}"));
    }

    fn rollback_after_failure(&self, sql: &str) {
        match self.run(sql, &[]) {
            Ok(_) => debug!(sql, "rolled back"),
            Err(err) => warn!(sql, error = %err, "rollback failed"),
        }
    }
}
