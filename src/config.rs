//! Connection configuration, loadable from TOML

use std::time::Duration;

use serde::Deserialize;

use crate::datatype::DateFormat;
use crate::error::Result;

/// Where the database lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// A private in-memory database.
    #[default]
    InMemory,
    /// A private on-disk database deleted when the connection closes.
    Temporary,
    /// A file path or `file:` URI.
    Uri(String),
}

impl Location {
    pub fn path(&self) -> &str {
        match self {
            Location::InMemory => ":memory:",
            Location::Temporary => "",
            Location::Uri(uri) => uri,
        }
    }
}

/// A `PRAGMA name = value` applied right after opening.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Pragma {
    pub name: String,
    pub value: String,
}

impl Pragma {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Pragma {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn statement(&self) -> String {
        format!("PRAGMA {} = {}", self.name, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub location: Location,
    pub readonly: bool,
    pub busy_timeout_ms: Option<u64>,
    /// Report extended result codes, e.g. `SQLITE_CONSTRAINT_UNIQUE`.
    pub extended_result_codes: bool,
    /// Applied in order.
    pub pragmas: Vec<Pragma>,
    pub date_format: DateFormat,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            location: Location::InMemory,
            readonly: false,
            busy_timeout_ms: None,
            extended_result_codes: true,
            pragmas: Vec::new(),
            date_format: DateFormat::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn in_memory() -> Self {
        ConnectionConfig::default()
    }

    pub fn at(uri: impl Into<String>) -> Self {
        ConnectionConfig {
            location: Location::Uri(uri.into()),
            ..ConnectionConfig::default()
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Adds the WAL and cache pragmas used for file-backed databases.
    pub fn tuned(mut self) -> Self {
        self.pragmas.extend([
            Pragma::new("journal_mode", "WAL"),
            Pragma::new("synchronous", "NORMAL"),
            Pragma::new("cache_size", "-64000"),
            Pragma::new("temp_store", "MEMORY"),
            Pragma::new("mmap_size", "268435456"),
            Pragma::new("foreign_keys", "ON"),
        ]);
        self
    }

    pub fn with_pragma(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pragmas.push(Pragma::new(name, value));
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }
}
