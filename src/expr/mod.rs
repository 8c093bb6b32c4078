//! Typed SQL expression compiler
//!
//! An [`Expression`] is a SQL template with positional `?` placeholders and
//! the ordered values bound to them. Expressions only ever grow by
//! concatenation, so the placeholder count of the template always equals the
//! number of bindings. The type parameter records the logical SQL type of the
//! fragment and only restricts which operators apply; it never changes the
//! generated SQL.

mod aggregate;
mod collation;
mod operators;
mod setter;

use std::fmt;
use std::marker::PhantomData;

use crate::datatype::{Datatype, SqlType};
use crate::error::{Error, Result};
use crate::value::Value;

pub use collation::Collation;
pub use operators::Predicate;
pub use setter::Setter;

/// A compiled SQL fragment: template plus bindings.
pub struct Expression<T = ()> {
    template: String,
    bindings: Vec<Value>,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Expression<T> {
    fn clone(&self) -> Self {
        Expression::from_parts(self.template.clone(), self.bindings.clone())
    }
}

impl<T> fmt::Debug for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("template", &self.template)
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl<T> Expression<T> {
    /// Trusted SQL text, used verbatim. Never pass caller data here.
    pub fn literal(sql: impl Into<String>) -> Self {
        Expression::from_parts(sql.into(), Vec::new())
    }

    /// A quoted column reference.
    pub fn column(name: &str) -> Self {
        Expression::literal(quote_identifier(name))
    }

    /// Raw template and bindings, checked against each other.
    pub fn with_bindings(template: impl Into<String>, bindings: Vec<Value>) -> Result<Self> {
        let template = template.into();
        let expected = placeholder_count(&template);
        if expected != bindings.len() {
            return Err(Error::BindingCountMismatch {
                expected,
                actual: bindings.len(),
            });
        }
        Ok(Expression::from_parts(template, bindings))
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn bindings(&self) -> &[Value] {
        &self.bindings
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.template, self.bindings)
    }

    /// Drops the type marker.
    pub fn untyped(self) -> Expression {
        self.retype()
    }

    pub(crate) fn from_parts(template: String, bindings: Vec<Value>) -> Self {
        Expression {
            template,
            bindings,
            marker: PhantomData,
        }
    }

    pub(crate) fn retype<U>(self) -> Expression<U> {
        Expression::from_parts(self.template, self.bindings)
    }

    /// Whether this is the bare placeholder of an absent value.
    pub(crate) fn is_null_literal(&self) -> bool {
        self.template == "?" && matches!(self.bindings.as_slice(), [Value::Null])
    }
}

impl<T: SqlType> Expression<T> {
    /// A bound value: template `?` with one binding.
    pub fn value(value: T) -> Self {
        Expression::from_parts("?".to_string(), vec![value.encode()])
    }
}

impl<V: Datatype> Expression<Option<V>> {
    /// An absent value of an optional type.
    pub fn null() -> Self {
        Expression::from_parts("?".to_string(), vec![Value::Null])
    }
}

/// The implicit row id of a table.
pub fn rowid() -> Expression<i64> {
    Expression::literal("rowid")
}

/// `count(*)`
pub fn count_star() -> Expression<i64> {
    Expression::literal("count(*)")
}

/// A call to a built-in SQL function. `name` is trusted SQL text.
pub fn function<T>(name: &str, args: Vec<Expression>) -> Expression<T> {
    wrap(name, join::<(), ()>(", ", args))
}

/// Wraps a string in double quotes, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Number of positional placeholders in a template.
///
/// A `?` inside a quoted identifier or string literal is not a placeholder.
pub fn placeholder_count(template: &str) -> usize {
    placeholder_offsets(template).count()
}

/// Byte offsets of the `?` placeholders outside `'...'` and `"..."` runs.
///
/// A doubled quote inside a run is an escape and does not end it.
fn placeholder_offsets(template: &str) -> impl Iterator<Item = usize> + '_ {
    let mut quote: Option<char> = None;
    template.char_indices().filter_map(move |(offset, ch)| {
        match (quote, ch) {
            // Leaving and re-entering a run covers the doubled-quote escape.
            (Some(open), ch) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '?') => return Some(offset),
            (None, _) => {}
        }
        None
    })
}

/// `lhs op rhs`, optionally parenthesized.
pub(crate) fn infix<A, B, U>(
    op: &str,
    lhs: Expression<A>,
    rhs: Expression<B>,
    wrap: bool,
) -> Expression<U> {
    let (lhs_template, mut bindings) = lhs.into_parts();
    let (rhs_template, rhs_bindings) = rhs.into_parts();
    bindings.extend(rhs_bindings);
    let template = if wrap {
        format!("({lhs_template} {op} {rhs_template})")
    } else {
        format!("{lhs_template} {op} {rhs_template}")
    };
    Expression::from_parts(template, bindings)
}

/// `function(expr)`
pub(crate) fn wrap<A, U>(function: &str, expr: Expression<A>) -> Expression<U> {
    let (template, bindings) = expr.into_parts();
    Expression::from_parts(format!("{function}({template})"), bindings)
}

/// Concatenates fragments with a separator.
pub(crate) fn join<A, U>(
    separator: &str,
    exprs: impl IntoIterator<Item = Expression<A>>,
) -> Expression<U> {
    let mut templates = Vec::new();
    let mut bindings = Vec::new();
    for expr in exprs {
        let (template, values) = expr.into_parts();
        templates.push(template);
        bindings.extend(values);
    }
    Expression::from_parts(templates.join(separator), bindings)
}

/// Anything that flattens to an untyped expression.
pub trait Expressible {
    fn expression(&self) -> Expression;

    /// The naïve inliner: every placeholder replaced by its escaped literal.
    ///
    /// Only for contexts with no binding channel, such as DDL.
    fn compile_standalone(&self) -> String {
        let (template, bindings) = self.expression().into_parts();
        let mut sql = String::with_capacity(template.len());
        let mut copied = 0;
        for (offset, value) in placeholder_offsets(&template).zip(&bindings) {
            sql.push_str(&template[copied..offset]);
            sql.push_str(&inline_literal(value));
            copied = offset + 1;
        }
        sql.push_str(&template[copied..]);
        sql
    }
}

impl<T> Expressible for Expression<T> {
    fn expression(&self) -> Expression {
        self.clone().untyped()
    }
}

/// SQL literal text for a value.
pub fn inline_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) if f.is_nan() => "NULL".to_string(),
        Value::Float(f) if f.is_infinite() && f.is_sign_positive() => "9e999".to_string(),
        Value::Float(f) if f.is_infinite() => "-9e999".to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::Text(t) => format!("'{}'", t.replace('\'', "''")),
        Value::Blob(b) => format!("x'{}'", b.to_hex()),
    }
}

/// Operands accepted wherever an expression is expected.
pub trait IntoExpression {
    type SqlType: SqlType;

    fn into_expression(self) -> Expression<Self::SqlType>;
}

impl<T: SqlType> IntoExpression for Expression<T> {
    type SqlType = T;

    fn into_expression(self) -> Expression<T> {
        self
    }
}

impl<T: SqlType> IntoExpression for &Expression<T> {
    type SqlType = T;

    fn into_expression(self) -> Expression<T> {
        self.clone()
    }
}

impl<V: Datatype> IntoExpression for V {
    type SqlType = V;

    fn into_expression(self) -> Expression<V> {
        Expression::value(self)
    }
}

impl<V: Datatype> IntoExpression for Option<V> {
    type SqlType = Option<V>;

    fn into_expression(self) -> Expression<Option<V>> {
        Expression::value(self)
    }
}

impl IntoExpression for &str {
    type SqlType = String;

    fn into_expression(self) -> Expression<String> {
        Expression::value(self.to_string())
    }
}
