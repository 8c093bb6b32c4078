//! Database module - connections, prepared statements and transactions

mod connection;
mod database;
mod functions;
mod params;
mod row;
mod statement;
mod transaction;

pub use connection::Connection;
pub use database::Database;
pub use functions::SqlFunction;
pub use params::{convert_params, Params};
pub use row::Row;
pub use statement::{Rows, State, Statement};
pub use transaction::TransactionMode;
