//! Row module - decoded result rows

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Map;

use crate::datatype::{DateFormat, SqlType};
use crate::error::{ConversionError, Error, Result};
use crate::value::{Type, Value};

/// One result row: its values in column order plus the shared column names.
///
/// A row also carries the date format of the connection that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    names: Arc<[String]>,
    date_format: Arc<DateFormat>,
}

impl Row {
    pub(crate) fn new(
        values: Vec<Value>,
        names: Arc<[String]>,
        date_format: Arc<DateFormat>,
    ) -> Self {
        Row {
            values,
            names,
            date_format,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values
            .get(index)
            .ok_or(Error::InvalidColumnIndex(index))
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::InvalidColumnName(name.to_string()))
    }

    /// Decode column `index` as `T`.
    pub fn get<T: SqlType>(&self, index: usize) -> Result<T> {
        Ok(T::decode(self.value(index)?.clone())?)
    }

    pub fn get_by_name<T: SqlType>(&self, name: &str) -> Result<T> {
        self.get(self.index_of(name)?)
    }

    fn text(&self, index: usize) -> Result<&str> {
        match self.value(index)? {
            Value::Text(text) => Ok(text),
            other => Err(ConversionError::mismatch(Type::Text, other.value_type()).into()),
        }
    }

    /// Decode a text timestamp with the connection's date format.
    pub fn get_datetime(&self, index: usize) -> Result<NaiveDateTime> {
        self.get_datetime_with(index, &self.date_format)
    }

    /// Decode a text date with the connection's date format.
    pub fn get_date(&self, index: usize) -> Result<NaiveDate> {
        Ok(self.date_format.parse_date(self.text(index)?)?)
    }

    /// Decode a text timestamp with an explicit format.
    pub fn get_datetime_with(&self, index: usize, format: &DateFormat) -> Result<NaiveDateTime> {
        Ok(format.parse_datetime(self.text(index)?)?)
    }

    /// Row as a JSON object keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        let map: Map<String, serde_json::Value> = self
            .names
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Row as a JSON array in column order
    pub fn to_json_array(&self) -> serde_json::Value {
        serde_json::Value::Array(self.values.iter().map(Value::to_json).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new(
            vec![Value::Integer(1), Value::Null, Value::from("2024-05-06 07:08:09")],
            Arc::from(vec!["id".to_string(), "note".to_string(), "at".to_string()]),
            Arc::new(DateFormat::default()),
        )
    }

    #[test]
    fn test_typed_access() {
        let row = row();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
        assert_eq!(row.get_by_name::<Option<String>>("NOTE").unwrap(), None);
        assert!(matches!(row.get::<String>(1), Err(Error::Conversion(_))));
        assert!(matches!(row.get::<i64>(9), Err(Error::InvalidColumnIndex(9))));
    }

    #[test]
    fn test_datetime_with_format() {
        let format = DateFormat::new("%Y-%m-%d %H:%M:%S", "%Y-%m-%d");
        let at = row().get_datetime_with(2, &format).unwrap();
        assert_eq!(at.to_string(), "2024-05-06 07:08:09");

        // The default format also accepts the CURRENT_TIMESTAMP layout.
        assert_eq!(row().get_datetime(2).unwrap(), at);
        assert!(matches!(row().get_date(0), Err(Error::Conversion(_))));
    }

    #[test]
    fn test_json_rendering() {
        let row = row();
        assert_eq!(
            row.to_json(),
            serde_json::json!({"id": 1, "note": null, "at": "2024-05-06 07:08:09"})
        );
        assert_eq!(row.to_json_array()[0], serde_json::json!(1));
    }
}
