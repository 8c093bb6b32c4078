//! Typed SQL expressions and a prepared-statement layer for SQLite.

pub mod config;
pub mod datatype;
pub mod db;
mod error;
pub mod expr;
mod models;
pub mod schema;
pub mod value;

pub use config::{ConnectionConfig, Location, Pragma};
pub use datatype::{Datatype, DateFormat, SqlType};
pub use db::{
    Connection, Database, Params, Row, Rows, SqlFunction, State, Statement, TransactionMode,
};
pub use error::{error_text, ConversionError, Error, Result};
pub use expr::{Collation, Expressible, Expression, IntoExpression, Setter};
pub use models::QueryResult;
pub use value::{Blob, Type, Value};

/// Version of the bundled SQLite library
pub fn sqlite_version() -> &'static str {
    rusqlite::version()
}
