//! `SET column = value` fragments for UPDATE statements

use super::{infix, join, Expressible, Expression, IntoExpression};
use crate::datatype::{Addable, Assignable, Integral, Join, Numeric, SqlType};
use crate::value::Value;

/// One assignment of an UPDATE statement.
#[derive(Debug, Clone)]
pub struct Setter {
    column: Expression,
    value: Expression,
}

impl Setter {
    /// The comma-separated assignment list of a `SET` clause.
    pub fn join(setters: &[Setter]) -> Expression {
        join(", ", setters.iter().map(Expressible::expression))
    }
}

impl Expressible for Setter {
    fn expression(&self) -> Expression {
        infix("=", self.column.clone(), self.value.clone(), false)
    }
}

impl<T: SqlType> Expression<T> {
    /// `column = value`. Optional columns accept absent values, required
    /// columns do not.
    pub fn set<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Assignable<R::SqlType>,
    {
        Setter {
            column: self.clone().untyped(),
            value: value.into_expression().untyped(),
        }
    }

    fn set_infix<R>(&self, op: &str, value: R) -> Setter
    where
        R: IntoExpression,
    {
        let value: Expression = infix(op, self.clone(), value.into_expression(), true);
        Setter {
            column: self.clone().untyped(),
            value,
        }
    }

    /// `column = (column + value)`
    ///
    /// Compound setters follow the nullability rule of [`Expression::set`]:
    /// a required column rejects an optional operand.
    ///
    /// ```compile_fail
    /// use sqlite_typed::expr::Expression;
    ///
    /// let hits = Expression::<i64>::column("hits");
    /// hits.set_add(None::<i64>);
    /// ```
    ///
    /// ```
    /// use sqlite_typed::expr::Expression;
    ///
    /// let hits = Expression::<Option<i64>>::column("hits");
    /// hits.set_add(None::<i64>);
    /// hits.set_add(2_i64);
    /// ```
    pub fn set_add<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Addable,
    {
        self.set_infix(<T::Base as Addable>::OPERATOR, value)
    }

    pub fn set_sub<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Numeric,
    {
        self.set_infix("-", value)
    }

    pub fn set_mul<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Numeric,
    {
        self.set_infix("*", value)
    }

    pub fn set_div<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Numeric,
    {
        self.set_infix("/", value)
    }

    pub fn set_rem<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Integral,
    {
        self.set_infix("%", value)
    }

    pub fn set_shl<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Integral,
    {
        self.set_infix("<<", value)
    }

    pub fn set_shr<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Integral,
    {
        self.set_infix(">>", value)
    }

    pub fn set_bitand<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Integral,
    {
        self.set_infix("&", value)
    }

    pub fn set_bitor<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Integral,
    {
        self.set_infix("|", value)
    }

    pub fn set_bitxor<R>(&self, value: R) -> Setter
    where
        R: IntoExpression,
        T: Join<R::SqlType> + Assignable<R::SqlType>,
        T::Base: Integral,
    {
        let value: Expression = (self ^ value).untyped();
        Setter {
            column: self.clone().untyped(),
            value,
        }
    }

    /// `column = (column + 1)`
    pub fn increment(&self) -> Setter
    where
        T::Base: Integral,
    {
        self.set_infix("+", one())
    }

    /// `column = (column - 1)`
    pub fn decrement(&self) -> Setter
    where
        T::Base: Integral,
    {
        self.set_infix("-", one())
    }
}

fn one() -> Expression<i64> {
    Expression::from_parts("?".to_string(), vec![Value::Integer(1)])
}
