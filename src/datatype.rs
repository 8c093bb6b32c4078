//! Conversion contract between domain values and wire values
//!
//! A [`Datatype`] is a non-null domain type with a fixed wire tag. [`SqlType`]
//! lifts every datatype and its `Option` into the type parameter carried by
//! [`Expression`](crate::expr::Expression), so the compiler knows both the
//! base type and the nullability of every fragment.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::ConversionError;
use crate::value::{Type, Value};

/// A non-null domain type that can be stored in a column.
pub trait Datatype: Sized + 'static {
    /// The wire tag values of this type serialize to.
    const DECLARED_TYPE: Type;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

/// The logical SQL type of an expression: a datatype, or an optional one.
pub trait SqlType: Sized + 'static {
    type Base: Datatype;

    const NULLABLE: bool;

    /// The same nullability over another base type.
    type Rebase<U: Datatype>: SqlType<Base = U>;

    fn encode(&self) -> Value;

    fn decode(value: Value) -> Result<Self, ConversionError>;
}

impl<V: Datatype> SqlType for V {
    type Base = V;
    const NULLABLE: bool = false;
    type Rebase<U: Datatype> = U;

    fn encode(&self) -> Value {
        self.to_value()
    }

    fn decode(value: Value) -> Result<Self, ConversionError> {
        V::from_value(value)
    }
}

impl<V: Datatype> SqlType for Option<V> {
    type Base = V;
    const NULLABLE: bool = true;
    type Rebase<U: Datatype> = Option<U>;

    fn encode(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn decode(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => V::from_value(other).map(Some),
        }
    }
}

/// Result type of combining two operands that share a base type.
///
/// The result is optional as soon as either side is.
pub trait Join<Rhs: SqlType>: SqlType {
    type Output: SqlType<Base = Self::Base>;
}

impl<V: Datatype> Join<V> for V {
    type Output = V;
}

impl<V: Datatype> Join<Option<V>> for V {
    type Output = Option<V>;
}

impl<V: Datatype> Join<V> for Option<V> {
    type Output = Option<V>;
}

impl<V: Datatype> Join<Option<V>> for Option<V> {
    type Output = Option<V>;
}

/// Whether a value of type `Rhs` may be stored in a column of this type.
pub trait Assignable<Rhs: SqlType>: SqlType {}

impl<V: Datatype> Assignable<V> for V {}

impl<V: Datatype> Assignable<V> for Option<V> {}

impl<V: Datatype> Assignable<Option<V>> for Option<V> {}

/// Types supporting `+`. Text concatenates with `||`.
pub trait Addable: Datatype {
    const OPERATOR: &'static str;
}

/// Types supporting `- * /` and the numeric aggregates.
pub trait Numeric: Addable {}

/// Types supporting `% << >> & | ^ ~`.
pub trait Integral: Numeric {}

/// Types with a meaningful ordering (`< <= > >=`, `min`, `max`, `BETWEEN`).
pub trait Comparable: Datatype {}

impl Addable for i64 {
    const OPERATOR: &'static str = "+";
}

impl Addable for f64 {
    const OPERATOR: &'static str = "+";
}

impl Addable for String {
    const OPERATOR: &'static str = "||";
}

impl Numeric for i64 {}
impl Numeric for f64 {}
impl Integral for i64 {}

impl Comparable for i64 {}
impl Comparable for f64 {}
impl Comparable for bool {}
impl Comparable for String {}
impl Comparable for NaiveDateTime {}
impl Comparable for NaiveDate {}
impl Comparable for DateTime<Utc> {}

impl Datatype for i64 {
    const DECLARED_TYPE: Type = Type::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(ConversionError::mismatch(Type::Integer, other.value_type())),
        }
    }
}

impl Datatype for f64 {
    const DECLARED_TYPE: Type = Type::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(f) => Ok(f),
            // REAL columns hand back whole numbers as integers
            Value::Integer(i) => Ok(i as f64),
            other => Err(ConversionError::mismatch(Type::Float, other.value_type())),
        }
    }
}

impl Datatype for bool {
    const DECLARED_TYPE: Type = Type::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            other => Err(ConversionError::mismatch(Type::Integer, other.value_type())),
        }
    }
}

impl Datatype for String {
    const DECLARED_TYPE: Type = Type::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(t) => Ok(t),
            other => Err(ConversionError::mismatch(Type::Text, other.value_type())),
        }
    }
}

impl Datatype for Vec<u8> {
    const DECLARED_TYPE: Type = Type::Blob;

    fn to_value(&self) -> Value {
        Value::from(self.as_slice())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Blob(b) => Ok(b.into_vec()),
            other => Err(ConversionError::mismatch(Type::Blob, other.value_type())),
        }
    }
}

fn text_of(value: Value) -> Result<String, ConversionError> {
    match value {
        Value::Text(t) => Ok(t),
        other => Err(ConversionError::mismatch(Type::Text, other.value_type())),
    }
}

impl Datatype for NaiveDateTime {
    const DECLARED_TYPE: Type = Type::Text;

    fn to_value(&self) -> Value {
        DateFormat::default().datetime_value(self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        DateFormat::default().parse_datetime(&text_of(value)?)
    }
}

impl Datatype for DateTime<Utc> {
    const DECLARED_TYPE: Type = Type::Text;

    fn to_value(&self) -> Value {
        DateFormat::default().datetime_value(&self.naive_utc())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        DateFormat::default()
            .parse_datetime(&text_of(value)?)
            .map(|naive| naive.and_utc())
    }
}

impl Datatype for NaiveDate {
    const DECLARED_TYPE: Type = Type::Text;

    fn to_value(&self) -> Value {
        DateFormat::default().date_value(self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        DateFormat::default().parse_date(&text_of(value)?)
    }
}

/// Textual encoding of date types.
///
/// Patterns use `chrono`'s strftime syntax. Timestamps are always UTC.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DateFormat {
    pub datetime: String,
    pub date: String,
}

/// `CURRENT_TIMESTAMP` layout, accepted when parsing.
const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.f";

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat {
            datetime: "%Y-%m-%dT%H:%M:%S%.3f".to_string(),
            date: "%Y-%m-%d".to_string(),
        }
    }
}

impl DateFormat {
    pub fn new(datetime: impl Into<String>, date: impl Into<String>) -> Self {
        DateFormat {
            datetime: datetime.into(),
            date: date.into(),
        }
    }

    /// Text value of a timestamp, ready to bind.
    pub fn datetime_value(&self, value: &NaiveDateTime) -> Value {
        Value::Text(self.format_datetime(value))
    }

    pub fn date_value(&self, value: &NaiveDate) -> Value {
        Value::Text(self.format_date(value))
    }

    pub fn format_datetime(&self, value: &NaiveDateTime) -> String {
        value.format(&self.datetime).to_string()
    }

    pub fn format_date(&self, value: &NaiveDate) -> String {
        value.format(&self.date).to_string()
    }

    pub fn parse_datetime(&self, text: &str) -> Result<NaiveDateTime, ConversionError> {
        NaiveDateTime::parse_from_str(text, &self.datetime)
            .or_else(|_| NaiveDateTime::parse_from_str(text, SQLITE_TIMESTAMP))
            .map_err(|e| ConversionError::Decode(format!("invalid timestamp {text:?}: {e}")))
    }

    pub fn parse_date(&self, text: &str) -> Result<NaiveDate, ConversionError> {
        NaiveDate::parse_from_str(text, &self.date)
            .map_err(|e| ConversionError::Decode(format!("invalid date {text:?}: {e}")))
    }
}
