//! Params module - converts JSON parameters to bindable values

use serde_json::Value as Json;

use crate::value::Value;

/// Parameters for one statement execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<Value>),
    /// Parameter names with or without their `:`/`@`/`$` prefix.
    Named(Vec<(String, Value)>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    /// Convert JSON parameters
    ///
    /// An object binds by name, an array positionally, `null` binds nothing
    /// and any other value is a single positional parameter.
    pub fn from_json(params: &Json) -> Params {
        match params {
            Json::Null => Params::default(),
            Json::Array(values) => Params::Positional(convert_params(values)),
            Json::Object(map) => Params::Named(
                map.iter()
                    .map(|(name, value)| (name.clone(), Value::from_json(value)))
                    .collect(),
            ),
            single => Params::Positional(vec![Value::from_json(single)]),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::Positional(values) => values.is_empty(),
            Params::Named(values) => values.is_empty(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

/// Convert positional JSON parameters
pub fn convert_params(params: &[Json]) -> Vec<Value> {
    params.iter().map(Value::from_json).collect()
}
