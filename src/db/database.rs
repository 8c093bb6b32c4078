//! Database module - a connection shared behind one lock
//!
//! Every call on a [`Database`] runs while holding the connection's mutex,
//! which makes the mutex the serial execution context for all clones.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value as Json;

use super::{Connection, Params, Row, TransactionMode};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::models::QueryResult;

/// Shareable handle to one connection. Clones share the connection.
#[derive(Clone, Debug)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        Ok(Database::from_connection(Connection::open(config)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Database::open(&ConnectionConfig::in_memory())
    }

    pub fn from_connection(conn: Connection) -> Self {
        Database {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside a transaction with exclusive access to the connection.
    pub fn transaction<T, F>(&self, mode: TransactionMode, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        conn.transaction(mode, f)
    }

    /// Run `f` on the blocking thread pool.
    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| Error::LockPoisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::Background(e.to_string()))?
    }

    /// Execute SQL directly, possibly several statements
    pub fn exec(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.lock()?;
        conn.execute(sql)?;
        Ok(QueryResult {
            changes: conn.changes(),
            last_insert_rowid: conn.last_insert_rowid().unwrap_or(0),
        })
    }

    /// Execute one statement with JSON parameters
    pub fn run_json(&self, sql: &str, params: &Json) -> Result<QueryResult> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        stmt.bind_params(&Params::from_json(params))?;
        stmt.run()
    }

    fn rows(&self, sql: &str, params: &Json) -> Result<Vec<Row>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        stmt.bind_params(&Params::from_json(params))?;
        let rows = stmt.query()?.collect::<Result<Vec<_>>>();
        rows
    }

    /// Execute query and return all rows as objects
    pub fn all(&self, sql: &str, params: &Json) -> Result<Json> {
        let rows = self.rows(sql, params)?;
        Ok(Json::Array(rows.iter().map(Row::to_json).collect()))
    }

    /// Execute query and return first row as object, `null` if there is none
    pub fn get(&self, sql: &str, params: &Json) -> Result<Json> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        stmt.bind_params(&Params::from_json(params))?;
        let row = stmt.query()?.next_row()?;
        Ok(row.map(|row| row.to_json()).unwrap_or(Json::Null))
    }

    /// Execute query and return all rows as arrays
    pub fn values(&self, sql: &str, params: &Json) -> Result<Json> {
        let rows = self.rows(sql, params)?;
        Ok(Json::Array(rows.iter().map(Row::to_json_array).collect()))
    }
}
