//! Error types shared by the expression compiler and the statement layer

use std::ffi::NulError;

use rusqlite::ffi;
use thiserror::Error;

use crate::value::Type;

/// Crate-wide result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure to turn a wire [`Value`](crate::Value) into a domain type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The wire tag cannot represent the requested domain type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: Type, found: Type },

    /// The wire value has the right tag but its contents are invalid.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ConversionError {
    pub(crate) fn mismatch(expected: Type, found: Type) -> Self {
        ConversionError::TypeMismatch { expected, found }
    }
}

/// Every failure surfaced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A non-success result code returned by SQLite.
    #[error("SQLite Error: {message} (code {code})")]
    Engine {
        code: i32,
        message: String,
        sql: Option<String>,
    },

    #[error("{actual} values passed, {expected} expected")]
    BindingCountMismatch { expected: usize, actual: usize },

    #[error("parameter not found: {0}")]
    UnknownParameterName(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("column index out of range: {0}")]
    InvalidColumnIndex(usize),

    #[error("no such column: {0}")]
    InvalidColumnName(String),

    /// The SQL text held no statement (empty, or only comments).
    #[error("SQL text contains no statement")]
    EmptyStatement,

    #[error("SQL text contains an interior NUL byte: {0}")]
    InvalidSql(#[from] NulError),

    #[error("SQLite Error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("DB Lock failed")]
    LockPoisoned,

    #[error("background task failed: {0}")]
    Background(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Builds an engine error from a bare result code, using SQLite's
    /// generic description of that code as the message.
    pub fn from_code(code: i32, sql: Option<String>) -> Self {
        Error::Engine {
            code,
            message: error_text(code),
            sql,
        }
    }

    /// The SQLite result code, when the error came from the engine.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Engine { code, .. } => Some(*code),
            Error::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => Some(err.extended_code),
            _ => None,
        }
    }

    /// Whether the engine gave up on a lock (`SQLITE_BUSY` and its
    /// extended variants).
    pub fn is_busy(&self) -> bool {
        self.code()
            .map(|code| code & 0xff == ffi::SQLITE_BUSY)
            .unwrap_or(false)
    }

    /// The compiled SQL the error was raised for, if known.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Engine { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// SQLite's English description of a result code.
pub fn error_text(code: i32) -> String {
    unsafe {
        let ptr = ffi::sqlite3_errstr(code);
        if ptr.is_null() {
            return format!("unknown error code {code}");
        }
        std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_detection_ignores_extended_bits() {
        let err = Error::from_code(ffi::SQLITE_BUSY | (2 << 8), None);
        assert!(err.is_busy());
        assert!(!Error::from_code(ffi::SQLITE_CONSTRAINT, None).is_busy());
    }

    #[test]
    fn test_engine_error_display() {
        let err = Error::from_code(ffi::SQLITE_CONSTRAINT, Some("INSERT".into()));
        assert!(err.to_string().starts_with("SQLite Error:"));
        assert_eq!(err.sql(), Some("INSERT"));
    }
}
