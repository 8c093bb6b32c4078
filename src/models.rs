use serde::{Deserialize, Serialize};

/// Outcome of running a statement to completion
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Rows changed by the most recent INSERT, UPDATE or DELETE
    pub changes: u64,
    /// Row id of the most recent successful INSERT, 0 if none
    pub last_insert_rowid: i64,
}
