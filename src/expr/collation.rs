use std::fmt;

use super::{quote_identifier, Expressible, Expression};

/// A collating sequence for text comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Collation {
    Binary,
    Nocase,
    Rtrim,
    /// A collation registered on the connection, referenced by name.
    Custom(String),
}

impl Collation {
    pub fn name(&self) -> String {
        match self {
            Collation::Binary => "BINARY".to_string(),
            Collation::Nocase => "NOCASE".to_string(),
            Collation::Rtrim => "RTRIM".to_string(),
            Collation::Custom(name) => quote_identifier(name),
        }
    }
}

impl fmt::Display for Collation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Expressible for Collation {
    fn expression(&self) -> Expression {
        Expression::literal(self.name())
    }
}
