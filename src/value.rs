//! Wire values exchanged with SQLite

use std::fmt::{self, Write};

use base64::Engine;
use serde_json::Number;

/// The closed set of SQLite storage classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Null type
    Null,
    /// Integer type (INTEGER)
    Integer,
    /// Float type (REAL)
    Float,
    /// Text type (TEXT)
    Text,
    /// Blob/Binary type (BLOB)
    Blob,
}

impl Type {
    /// Get the declared SQLite type name
    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Null => "NULL",
            Type::Integer => "INTEGER",
            Type::Float => "REAL",
            Type::Text => "TEXT",
            Type::Blob => "BLOB",
        }
    }

    /// Get type from a declared column type name (case insensitive)
    pub fn parse_type(s: &str) -> Option<Type> {
        match s.trim().to_uppercase().as_str() {
            "NULL" => Some(Type::Null),
            "INTEGER" | "INT" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "BIGINT"
            | "UNSIGNED BIG INT" | "INT2" | "INT8" | "BOOLEAN" => Some(Type::Integer),
            "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "NUMERIC" | "DECIMAL" => {
                Some(Type::Float)
            }
            "TEXT" | "CHARACTER" | "VARCHAR" | "VARYING CHARACTER" | "NCHAR"
            | "NATIVE CHARACTER" | "NVARCHAR" | "CLOB" => Some(Type::Text),
            "BLOB" | "NONE" => Some(Type::Blob),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, owned blob storage.
///
/// The bytes are copied on construction and followed by a NUL terminator so
/// the buffer can be handed to C string APIs; [`Blob::as_bytes`] never
/// includes the terminator.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Blob {
    bytes: Box<[u8]>,
}

impl Blob {
    pub fn new(data: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(data.len() + 1);
        bytes.extend_from_slice(data);
        Blob::terminate(bytes)
    }

    fn terminate(mut bytes: Vec<u8>) -> Self {
        bytes.push(0);
        Blob {
            bytes: bytes.into_boxed_slice(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// The payload followed by its NUL terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lowercase hexadecimal rendering of the payload.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(self.len() * 2);
        for byte in self.as_bytes() {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    pub fn into_vec(self) -> Vec<u8> {
        let mut bytes = self.bytes.into_vec();
        bytes.pop();
        bytes
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x'{}'", self.to_hex())
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Blob::terminate(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Blob::new(bytes)
    }
}

/// A dynamically-typed SQLite value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Blob),
}

impl Value {
    pub fn value_type(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Integer(_) => Type::Integer,
            Value::Float(_) => Type::Float,
            Value::Text(_) => Type::Text,
            Value::Blob(_) => Type::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert a JSON parameter to a wire value.
    ///
    /// Arrays and objects are stored as their JSON text.
    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    /// Convert to JSON with blobs rendered as base64 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(t) => serde_json::Value::String(t.clone()),
            Value::Blob(b) => serde_json::Value::String(
                base64::engine::general_purpose::STANDARD.encode(b.as_bytes()),
            ),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(Blob::from(v))
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(Blob::new(v))
    }
}

impl From<Blob> for Value {
    fn from(v: Blob) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<Value> for rusqlite::types::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => rusqlite::types::Value::Null,
            Value::Integer(i) => rusqlite::types::Value::Integer(i),
            Value::Float(f) => rusqlite::types::Value::Real(f),
            Value::Text(t) => rusqlite::types::Value::Text(t),
            Value::Blob(b) => rusqlite::types::Value::Blob(b.into_vec()),
        }
    }
}

impl<'a> From<rusqlite::types::ValueRef<'a>> for Value {
    fn from(v: rusqlite::types::ValueRef<'a>) -> Self {
        match v {
            rusqlite::types::ValueRef::Null => Value::Null,
            rusqlite::types::ValueRef::Integer(i) => Value::Integer(i),
            rusqlite::types::ValueRef::Real(f) => Value::Float(f),
            rusqlite::types::ValueRef::Text(t) => {
                Value::Text(String::from_utf8_lossy(t).into_owned())
            }
            rusqlite::types::ValueRef::Blob(b) => Value::Blob(Blob::new(b)),
        }
    }
}
