//! Connection module - owns the engine handle and every callback registered on it

use std::cell::{Cell, RefCell};
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{ffi, OpenFlags};
use tracing::{debug, trace};

use super::functions::FunctionRegistry;
use super::{Row, Statement};
use crate::config::ConnectionConfig;
use crate::datatype::{DateFormat, SqlType};
use crate::error::{error_text, Error, Result};
use crate::expr::Expressible;
use crate::models::QueryResult;
use crate::value::Value;

type TraceCallback = Box<dyn FnMut(&str) + Send>;

/// An open SQLite connection.
///
/// Statements borrow the connection, so it always outlives them. The
/// connection is `Send` but not `Sync`; share it through
/// [`Database`](super::Database).
pub struct Connection {
    // Declared first so the handle closes before the callbacks it points at
    // are freed.
    raw: rusqlite::Connection,
    inserted: Box<Cell<bool>>,
    trace: RefCell<Option<TraceCallback>>,
    busy: RefCell<BusyState>,
    pub(super) registry: FunctionRegistry,
    date_format: Arc<DateFormat>,
}

#[derive(Default)]
struct BusyState {
    timeout: Option<Duration>,
    handler: Option<Box<BusyHandler>>,
}

struct BusyHandler {
    callback: Box<dyn FnMut(u32) -> bool + Send>,
    timeout: Option<Duration>,
    started: Option<Instant>,
}

impl BusyHandler {
    fn should_retry(&mut self, attempts: u32) -> bool {
        if attempts == 0 || self.started.is_none() {
            self.started = Some(Instant::now());
        }
        if let (Some(timeout), Some(started)) = (self.timeout, self.started) {
            if started.elapsed() >= timeout {
                return false;
            }
        }
        (self.callback)(attempts)
    }
}

unsafe extern "C" fn insert_hook(
    data: *mut c_void,
    op: c_int,
    _database: *const c_char,
    _table: *const c_char,
    _rowid: ffi::sqlite3_int64,
) {
    if op == ffi::SQLITE_INSERT {
        (*(data as *const Cell<bool>)).set(true);
    }
}

unsafe extern "C" fn busy_trampoline(data: *mut c_void, attempts: c_int) -> c_int {
    let handler = &mut *(data as *mut BusyHandler);
    let attempts = u32::try_from(attempts).unwrap_or(0);
    let retry = catch_unwind(AssertUnwindSafe(|| handler.should_retry(attempts)));
    c_int::from(matches!(retry, Ok(true)))
}

impl Connection {
    /// Open a connection as described by `config`
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        let mut flags = if config.readonly {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        };
        flags |= OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let raw = rusqlite::Connection::open_with_flags(config.location.path(), flags)?;
        let conn = Connection {
            raw,
            inserted: Box::new(Cell::new(false)),
            trace: RefCell::new(None),
            busy: RefCell::new(BusyState::default()),
            registry: FunctionRegistry::default(),
            date_format: Arc::new(config.date_format.clone()),
        };

        unsafe {
            let inserted = &*conn.inserted as *const Cell<bool> as *mut c_void;
            ffi::sqlite3_update_hook(conn.handle(), Some(insert_hook), inserted);
            ffi::sqlite3_extended_result_codes(
                conn.handle(),
                c_int::from(config.extended_result_codes),
            );
        }
        if let Some(timeout) = config.busy_timeout() {
            conn.set_busy_timeout(timeout)?;
        }
        for pragma in &config.pragmas {
            conn.run(&pragma.statement(), &[])?;
        }

        debug!(
            location = config.location.path(),
            readonly = config.readonly,
            "opened connection"
        );
        Ok(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Connection::open(&ConnectionConfig::in_memory())
    }

    pub(crate) fn handle(&self) -> *mut ffi::sqlite3 {
        unsafe { self.raw.handle() }
    }

    /// Wraps a result code together with the connection's last error message.
    pub(crate) fn engine_error(&self, code: c_int, sql: Option<String>) -> Error {
        let message = unsafe {
            let ptr = ffi::sqlite3_errmsg(self.handle());
            if ptr.is_null() {
                error_text(code)
            } else {
                CStr::from_ptr(ptr).to_string_lossy().into_owned()
            }
        };
        Error::Engine { code, message, sql }
    }

    /// Compile the first statement in `sql`.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        match self.prepare_next(sql)? {
            (Some(stmt), _) => Ok(stmt),
            (None, _) => Err(Error::EmptyStatement),
        }
    }

    /// Compiles the leading statement and reports how many bytes it used.
    fn prepare_next(&self, sql: &str) -> Result<(Option<Statement<'_>>, usize)> {
        let c_sql = CString::new(sql)?;
        let mut raw = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(self.handle(), c_sql.as_ptr(), -1, &mut raw, &mut tail)
        };
        if rc != ffi::SQLITE_OK {
            return Err(self.engine_error(rc, Some(sql.to_owned())));
        }

        let consumed = if tail.is_null() {
            sql.len()
        } else {
            (tail as usize).saturating_sub(c_sql.as_ptr() as usize)
        };
        let stmt = NonNull::new(raw).map(|raw| Statement::new(self, raw));
        if let Some(stmt) = &stmt {
            trace!(sql = %stmt.sql(), "prepared statement");
        }
        Ok((stmt, consumed))
    }

    /// Prepare an expression and bind its values.
    pub fn prepare_expression(&self, expr: &impl Expressible) -> Result<Statement<'_>> {
        let (template, bindings) = expr.expression().into_parts();
        let mut stmt = self.prepare(&template)?;
        stmt.bind(&bindings)?;
        Ok(stmt)
    }

    /// Run every statement in `sql`, in order.
    pub fn execute(&self, sql: &str) -> Result<()> {
        let mut rest = sql;
        while !rest.trim().is_empty() {
            let (stmt, consumed) = self.prepare_next(rest)?;
            if let Some(mut stmt) = stmt {
                stmt.run()?;
            }
            if consumed == 0 {
                break;
            }
            rest = rest.get(consumed..).unwrap_or_default();
        }
        Ok(())
    }

    /// Execute a single statement with positional values
    pub fn run(&self, sql: &str, values: &[Value]) -> Result<QueryResult> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(values)?;
        stmt.run()
    }

    /// Execute a single statement with named values (`:name`, `@name`, `$name`)
    pub fn run_named<N: AsRef<str>>(
        &self,
        sql: &str,
        values: &[(N, Value)],
    ) -> Result<QueryResult> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind_named(values)?;
        stmt.run()
    }

    pub fn run_expression(&self, expr: &impl Expressible) -> Result<QueryResult> {
        self.prepare_expression(expr)?.run()
    }

    /// First column of the first row, if any.
    pub fn scalar(&self, sql: &str, values: &[Value]) -> Result<Option<Value>> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(values)?;
        stmt.scalar()
    }

    /// Typed [`Connection::scalar`]. No row decodes like a NULL.
    pub fn scalar_as<T: SqlType>(&self, sql: &str, values: &[Value]) -> Result<T> {
        let value = self.scalar(sql, values)?.unwrap_or(Value::Null);
        Ok(T::decode(value)?)
    }

    pub fn query_rows(&self, sql: &str, values: &[Value]) -> Result<Vec<Row>> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(values)?;
        let rows = stmt.query()?.collect::<Result<Vec<_>>>();
        rows
    }

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> u64 {
        let changes = unsafe { ffi::sqlite3_changes(self.handle()) };
        u64::try_from(changes).unwrap_or(0)
    }

    /// Rows changed since the connection was opened.
    pub fn total_changes(&self) -> u64 {
        let changes = unsafe { ffi::sqlite3_total_changes(self.handle()) };
        u64::try_from(changes).unwrap_or(0)
    }

    /// Row id of the most recent successful INSERT on this connection;
    /// `None` until a row has been inserted.
    pub fn last_insert_rowid(&self) -> Option<i64> {
        self.inserted.get().then(|| self.raw.last_insert_rowid())
    }

    pub fn is_readonly(&self) -> bool {
        let main = b"main\0";
        unsafe { ffi::sqlite3_db_readonly(self.handle(), main.as_ptr().cast()) == 1 }
    }

    /// Path of the main database file; `None` for in-memory and temporary
    /// databases.
    pub fn filename(&self) -> Option<&str> {
        self.raw.path().filter(|path| !path.is_empty())
    }

    /// Encoding of date types on this connection, from
    /// [`ConnectionConfig::date_format`]. Rows read here decode with it.
    pub fn date_format(&self) -> &DateFormat {
        &self.date_format
    }

    pub(crate) fn shared_date_format(&self) -> Arc<DateFormat> {
        Arc::clone(&self.date_format)
    }

    /// A timestamp as text in this connection's format.
    pub fn datetime_value(&self, value: &NaiveDateTime) -> Value {
        self.date_format.datetime_value(value)
    }

    /// A date as text in this connection's format.
    pub fn date_value(&self, value: &NaiveDate) -> Value {
        self.date_format.date_value(value)
    }

    /// Wait up to `timeout` for locks held by other connections.
    ///
    /// With a busy handler installed, the timeout bounds the handler instead.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        let mut busy = self.busy.borrow_mut();
        busy.timeout = Some(timeout);
        match busy.handler.as_mut() {
            Some(handler) => {
                handler.timeout = Some(timeout);
                Ok(())
            }
            None => self.apply_busy_timeout(timeout),
        }
    }

    fn apply_busy_timeout(&self, timeout: Duration) -> Result<()> {
        let ms = c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX);
        let rc = unsafe { ffi::sqlite3_busy_timeout(self.handle(), ms) };
        if rc != ffi::SQLITE_OK {
            return Err(self.engine_error(rc, None));
        }
        Ok(())
    }

    /// Install or remove the busy handler.
    ///
    /// The handler receives the number of prior attempts and returns whether
    /// to retry. Once the busy timeout has elapsed it is no longer asked and
    /// the lock error surfaces; a zero timeout means a single attempt.
    pub fn set_busy_handler<F>(&self, handler: Option<F>) -> Result<()>
    where
        F: FnMut(u32) -> bool + Send + 'static,
    {
        let mut busy = self.busy.borrow_mut();
        match handler {
            Some(callback) => {
                let mut handler = Box::new(BusyHandler {
                    callback: Box::new(callback),
                    timeout: busy.timeout,
                    started: None,
                });
                let data = &mut *handler as *mut BusyHandler as *mut c_void;
                let rc = unsafe {
                    ffi::sqlite3_busy_handler(self.handle(), Some(busy_trampoline), data)
                };
                if rc != ffi::SQLITE_OK {
                    return Err(self.engine_error(rc, None));
                }
                busy.handler = Some(handler);
            }
            None => {
                let rc = unsafe { ffi::sqlite3_busy_handler(self.handle(), None, ptr::null_mut()) };
                if rc != ffi::SQLITE_OK {
                    return Err(self.engine_error(rc, None));
                }
                busy.handler = None;
                if let Some(timeout) = busy.timeout {
                    self.apply_busy_timeout(timeout)?;
                }
            }
        }
        Ok(())
    }

    /// Install or remove the trace callback, invoked with the expanded SQL
    /// each time a statement starts executing.
    pub fn set_trace<F>(&self, callback: Option<F>)
    where
        F: FnMut(&str) + Send + 'static,
    {
        *self.trace.borrow_mut() = callback.map(|f| Box::new(f) as TraceCallback);
    }

    pub(crate) fn has_trace(&self) -> bool {
        self.trace
            .try_borrow()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    pub(crate) fn trace_sql(&self, sql: &str) {
        // A statement run from inside the callback is not traced again.
        if let Ok(mut slot) = self.trace.try_borrow_mut() {
            if let Some(callback) = slot.as_mut() {
                callback(sql);
            }
        }
    }

    pub(super) fn raw(&self) -> &rusqlite::Connection {
        &self.raw
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("filename", &self.filename())
            .finish_non_exhaustive()
    }
}
