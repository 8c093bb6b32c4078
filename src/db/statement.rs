//! Statement module - one prepared statement and its cursor

use std::ffi::{c_int, CStr, CString};
use std::ptr::NonNull;
use std::slice;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use rusqlite::ffi;
use tracing::{trace, Level};

use super::{Connection, Params, Row};
use crate::error::{ConversionError, Error, Result};
use crate::models::QueryResult;
use crate::value::{Blob, Value};

/// Execution state of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Compiled (or reset); nothing bound since.
    Prepared,
    /// Values bound, not yet stepped.
    Bound,
    /// At least one row produced, more may follow.
    Stepping,
    /// Ran to completion or failed; reset before stepping again.
    Exhausted,
}

/// A prepared statement.
///
/// Owns its engine handle and finalizes it when dropped. Borrows the
/// [`Connection`] it was prepared on.
pub struct Statement<'conn> {
    conn: &'conn Connection,
    raw: NonNull<ffi::sqlite3_stmt>,
    column_names: OnceCell<Arc<[String]>>,
    state: State,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn new(conn: &'conn Connection, raw: NonNull<ffi::sqlite3_stmt>) -> Self {
        Statement {
            conn,
            raw,
            column_names: OnceCell::new(),
            state: State::Prepared,
        }
    }

    fn raw(&self) -> *mut ffi::sqlite3_stmt {
        self.raw.as_ptr()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// The SQL text the statement was compiled from
    pub fn sql(&self) -> String {
        unsafe {
            let ptr = ffi::sqlite3_sql(self.raw());
            if ptr.is_null() {
                return String::new();
            }
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    /// The SQL text with the currently bound values substituted
    pub fn expanded_sql(&self) -> Option<String> {
        unsafe {
            let ptr = ffi::sqlite3_expanded_sql(self.raw());
            if ptr.is_null() {
                return None;
            }
            let sql = CStr::from_ptr(ptr).to_string_lossy().into_owned();
            ffi::sqlite3_free(ptr.cast());
            Some(sql)
        }
    }

    pub fn parameter_count(&self) -> usize {
        let count = unsafe { ffi::sqlite3_bind_parameter_count(self.raw()) };
        usize::try_from(count).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        let count = unsafe { ffi::sqlite3_column_count(self.raw()) };
        usize::try_from(count).unwrap_or(0)
    }

    /// Result column names, resolved on first use.
    pub fn column_names(&self) -> Arc<[String]> {
        self.column_names
            .get_or_init(|| {
                (0..self.column_count())
                    .map(|i| unsafe {
                        let ptr = ffi::sqlite3_column_name(self.raw(), i as c_int);
                        if ptr.is_null() {
                            String::new()
                        } else {
                            CStr::from_ptr(ptr).to_string_lossy().into_owned()
                        }
                    })
                    .collect()
            })
            .clone()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.column_names()
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::InvalidColumnName(name.to_string()))
    }

    /// Return to [`State::Prepared`], optionally clearing bound values.
    pub fn reset(&mut self, clear_bindings: bool) {
        unsafe {
            // The return code repeats the last step error, already reported.
            ffi::sqlite3_reset(self.raw());
            if clear_bindings {
                ffi::sqlite3_clear_bindings(self.raw());
            }
        }
        self.state = State::Prepared;
    }

    /// Bind values to positional placeholders.
    ///
    /// An empty slice leaves existing bindings alone. A count mismatch is
    /// reported before anything is reset or rebound.
    pub fn bind(&mut self, values: &[Value]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let expected = self.parameter_count();
        if expected != values.len() {
            return Err(Error::BindingCountMismatch {
                expected,
                actual: values.len(),
            });
        }

        self.reset(true);
        for (i, value) in values.iter().enumerate() {
            self.bind_value(i as c_int + 1, value)?;
        }
        self.state = State::Bound;
        Ok(())
    }

    /// Bind values by parameter name.
    ///
    /// Names may carry their prefix (`:id`) or not (`id`); unprefixed names
    /// match `:`, `@` and `$` parameters. Every name is resolved before any
    /// value is bound.
    pub fn bind_named<N: AsRef<str>>(&mut self, values: &[(N, Value)]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let indexes = values
            .iter()
            .map(|(name, _)| self.parameter_index(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        self.reset(true);
        for (index, (_, value)) in indexes.into_iter().zip(values) {
            self.bind_value(index, value)?;
        }
        self.state = State::Bound;
        Ok(())
    }

    /// Bind parameters converted from JSON.
    pub fn bind_params(&mut self, params: &Params) -> Result<()> {
        match params {
            Params::Positional(values) => self.bind(values),
            Params::Named(values) => self.bind_named(values),
        }
    }

    fn parameter_index(&self, name: &str) -> Result<c_int> {
        let candidates = if name.starts_with([':', '@', '$', '?']) {
            vec![name.to_string()]
        } else {
            vec![format!(":{name}"), format!("@{name}"), format!("${name}")]
        };
        for candidate in candidates {
            let c_name = CString::new(candidate)?;
            let index = unsafe { ffi::sqlite3_bind_parameter_index(self.raw(), c_name.as_ptr()) };
            if index > 0 {
                return Ok(index);
            }
        }
        Err(Error::UnknownParameterName(name.to_string()))
    }

    fn bind_value(&self, index: c_int, value: &Value) -> Result<()> {
        let raw = self.raw();
        let rc = unsafe {
            match value {
                Value::Null => ffi::sqlite3_bind_null(raw, index),
                Value::Integer(i) => ffi::sqlite3_bind_int64(raw, index, *i),
                Value::Float(f) => ffi::sqlite3_bind_double(raw, index, *f),
                Value::Text(text) => ffi::sqlite3_bind_text(
                    raw,
                    index,
                    text.as_ptr().cast(),
                    byte_len(text.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
                Value::Blob(blob) => ffi::sqlite3_bind_blob(
                    raw,
                    index,
                    blob.as_bytes_with_nul().as_ptr().cast(),
                    byte_len(blob.len())?,
                    ffi::SQLITE_TRANSIENT(),
                ),
            }
        };
        if rc != ffi::SQLITE_OK {
            return Err(self.conn.engine_error(rc, Some(self.sql())));
        }
        Ok(())
    }

    /// Advance by one row; `true` when a row is available.
    pub fn step(&mut self) -> Result<bool> {
        match self.state {
            State::Exhausted => return Ok(false),
            State::Prepared | State::Bound => self.trace_start(),
            State::Stepping => {}
        }
        let rc = unsafe { ffi::sqlite3_step(self.raw()) };
        match rc {
            ffi::SQLITE_ROW => {
                self.state = State::Stepping;
                Ok(true)
            }
            ffi::SQLITE_DONE => {
                self.state = State::Exhausted;
                Ok(false)
            }
            code => {
                self.state = State::Exhausted;
                Err(self.conn.engine_error(code, Some(self.sql())))
            }
        }
    }

    fn trace_start(&self) {
        if !self.conn.has_trace() && !tracing::enabled!(Level::TRACE) {
            return;
        }
        let sql = self.expanded_sql().unwrap_or_else(|| self.sql());
        trace!(sql = %sql, "executing statement");
        self.conn.trace_sql(&sql);
    }

    /// Step to completion with the current bindings, discarding rows.
    pub fn run(&mut self) -> Result<QueryResult> {
        self.reset(false);
        while self.step()? {}
        Ok(QueryResult {
            changes: self.conn.changes(),
            last_insert_rowid: self.conn.last_insert_rowid().unwrap_or(0),
        })
    }

    pub fn run_with(&mut self, values: &[Value]) -> Result<QueryResult> {
        self.bind(values)?;
        self.run()
    }

    /// First column of the first row, or `None` when there is no row.
    pub fn scalar(&mut self) -> Result<Option<Value>> {
        self.reset(false);
        let value = if self.step()? {
            Some(self.column_value(0)?)
        } else {
            None
        };
        self.reset(false);
        Ok(value)
    }

    pub fn scalar_with(&mut self, values: &[Value]) -> Result<Option<Value>> {
        self.bind(values)?;
        self.scalar()
    }

    /// Iterate over the result rows from the start.
    pub fn query(&mut self) -> Result<Rows<'_, 'conn>> {
        self.reset(false);
        Ok(Rows {
            stmt: self,
            done: false,
        })
    }

    pub fn query_with(&mut self, values: &[Value]) -> Result<Rows<'_, 'conn>> {
        self.bind(values)?;
        self.query()
    }

    pub(crate) fn read_row(&self) -> Result<Row> {
        let values = (0..self.column_count())
            .map(|i| self.column_value(i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::new(
            values,
            self.column_names(),
            self.conn.shared_date_format(),
        ))
    }

    /// Decode one column of the current row according to its type tag.
    fn column_value(&self, index: usize) -> Result<Value> {
        if index >= self.column_count() {
            return Err(Error::InvalidColumnIndex(index));
        }
        let raw = self.raw();
        let i = index as c_int;
        let value = unsafe {
            match ffi::sqlite3_column_type(raw, i) {
                ffi::SQLITE_NULL => Value::Null,
                ffi::SQLITE_INTEGER => Value::Integer(ffi::sqlite3_column_int64(raw, i)),
                ffi::SQLITE_FLOAT => Value::Float(ffi::sqlite3_column_double(raw, i)),
                ffi::SQLITE_TEXT => {
                    let ptr = ffi::sqlite3_column_text(raw, i);
                    let bytes = column_bytes(ptr, ffi::sqlite3_column_bytes(raw, i));
                    let text = std::str::from_utf8(bytes)
                        .map_err(|e| ConversionError::Decode(format!("column {index}: {e}")))?;
                    Value::Text(text.to_owned())
                }
                ffi::SQLITE_BLOB => {
                    let ptr = ffi::sqlite3_column_blob(raw, i).cast::<u8>();
                    let bytes = column_bytes(ptr, ffi::sqlite3_column_bytes(raw, i));
                    Value::Blob(Blob::new(bytes))
                }
                tag => unreachable!("SQLite returned unknown column type {tag}"),
            }
        };
        Ok(value)
    }
}

/// # Safety
/// `ptr` must be null or valid for `len` bytes until the next step or reset.
unsafe fn column_bytes<'a>(ptr: *const u8, len: c_int) -> &'a [u8] {
    let len = usize::try_from(len).unwrap_or(0);
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        slice::from_raw_parts(ptr, len)
    }
}

fn byte_len(len: usize) -> Result<c_int> {
    c_int::try_from(len).map_err(|_| Error::from_code(ffi::SQLITE_TOOBIG, None))
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        unsafe {
            ffi::sqlite3_finalize(self.raw());
        }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql())
            .field("state", &self.state)
            .finish()
    }
}

/// Cursor over the rows of a statement.
///
/// Holds the statement exclusively; the statement is reset when the cursor
/// is dropped. A step failure is returned once, after which the cursor is
/// finished.
pub struct Rows<'stmt, 'conn> {
    stmt: &'stmt mut Statement<'conn>,
    done: bool,
}

impl Rows<'_, '_> {
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        match self.stmt.step() {
            Ok(true) => self.stmt.read_row().map(Some),
            Ok(false) => {
                self.done = true;
                Ok(None)
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }

    pub fn column_names(&self) -> Arc<[String]> {
        self.stmt.column_names()
    }
}

impl Iterator for Rows<'_, '_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl Drop for Rows<'_, '_> {
    fn drop(&mut self) {
        self.stmt.reset(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT ? UNION ALL SELECT 2").unwrap();
        assert_eq!(stmt.state(), State::Prepared);

        stmt.bind(&[Value::Integer(1)]).unwrap();
        assert_eq!(stmt.state(), State::Bound);

        assert!(stmt.step().unwrap());
        assert_eq!(stmt.state(), State::Stepping);
        assert!(stmt.step().unwrap());
        assert!(!stmt.step().unwrap());
        assert_eq!(stmt.state(), State::Exhausted);
        assert!(!stmt.step().unwrap());

        stmt.reset(false);
        assert_eq!(stmt.state(), State::Prepared);
        assert_eq!(stmt.scalar().unwrap(), Some(Value::Integer(1)));
    }

    #[test]
    fn test_column_metadata() {
        let conn = conn();
        let stmt = conn.prepare("SELECT 1 AS one, 'x' AS Two").unwrap();
        assert_eq!(stmt.column_count(), 2);
        assert_eq!(&*stmt.column_names(), &["one".to_string(), "Two".to_string()]);
        assert_eq!(stmt.column_index("two").unwrap(), 1);
        assert!(matches!(
            stmt.column_index("three"),
            Err(Error::InvalidColumnName(_))
        ));
    }

    #[test]
    fn test_expanded_sql() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT ?, ?").unwrap();
        stmt.bind(&[Value::Integer(7), Value::from("it's")]).unwrap();
        assert_eq!(stmt.sql(), "SELECT ?, ?");
        assert_eq!(stmt.expanded_sql().unwrap(), "SELECT 7, 'it''s'");
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT CAST(x'ff' AS TEXT)").unwrap();
        let mut rows = stmt.query().unwrap();
        assert!(matches!(
            rows.next_row(),
            Err(Error::Conversion(ConversionError::Decode(_)))
        ));
    }
}
