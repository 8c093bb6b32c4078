//! Operator algebra over typed expressions
//!
//! Every infix result is parenthesized, so nesting never depends on SQL
//! operator precedence.

use std::ops::{
    Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, RangeInclusive, Rem, Shl, Shr, Sub,
};

use super::{infix, wrap, Expression, IntoExpression};
use crate::datatype::{Addable, Comparable, Datatype, Integral, Join, Numeric, SqlType};

/// Boolean result of comparing `L` with `R`, optional when either side is.
pub type Predicate<L, R> = <<L as Join<R>>::Output as SqlType>::Rebase<bool>;

/// Type of combining `L` with the operand `R`.
type Combined<L, R> = Expression<<L as Join<<R as IntoExpression>::SqlType>>::Output>;

impl<L, R> Add<R> for Expression<L>
where
    R: IntoExpression,
    L: Join<R::SqlType>,
    L::Base: Addable,
{
    type Output = Combined<L, R>;

    fn add(self, rhs: R) -> Self::Output {
        infix(<L::Base as Addable>::OPERATOR, self, rhs.into_expression(), true)
    }
}

impl<L, R> Add<R> for &Expression<L>
where
    R: IntoExpression,
    L: Join<R::SqlType>,
    L::Base: Addable,
{
    type Output = Combined<L, R>;

    fn add(self, rhs: R) -> Self::Output {
        Add::add(self.clone(), rhs)
    }
}

macro_rules! binary_operator {
    ($trait:ident, $method:ident, $bound:ident, $op:literal) => {
        impl<L, R> $trait<R> for Expression<L>
        where
            R: IntoExpression,
            L: Join<R::SqlType>,
            L::Base: $bound,
        {
            type Output = Combined<L, R>;

            fn $method(self, rhs: R) -> Self::Output {
                infix($op, self, rhs.into_expression(), true)
            }
        }

        impl<L, R> $trait<R> for &Expression<L>
        where
            R: IntoExpression,
            L: Join<R::SqlType>,
            L::Base: $bound,
        {
            type Output = Combined<L, R>;

            fn $method(self, rhs: R) -> Self::Output {
                $trait::$method(self.clone(), rhs)
            }
        }
    };
}

binary_operator!(Sub, sub, Numeric, "-");
binary_operator!(Mul, mul, Numeric, "*");
binary_operator!(Div, div, Numeric, "/");
binary_operator!(Rem, rem, Integral, "%");
binary_operator!(Shl, shl, Integral, "<<");
binary_operator!(Shr, shr, Integral, ">>");
binary_operator!(BitAnd, bitand, Integral, "&");
binary_operator!(BitOr, bitor, Integral, "|");

/// `(~(a & b)) & (a | b)`, SQLite has no XOR operator.
fn xor<A, B, U>(lhs: Expression<A>, rhs: Expression<B>) -> Expression<U> {
    let both: Expression = infix("&", lhs.clone(), rhs.clone(), true);
    let either: Expression = infix("|", lhs, rhs, true);
    let (template, bindings) = both.into_parts();
    let not_both: Expression = Expression::from_parts(format!("(~{template})"), bindings);
    infix("&", not_both, either, true)
}

impl<L, R> BitXor<R> for Expression<L>
where
    R: IntoExpression,
    L: Join<R::SqlType>,
    L::Base: Integral,
{
    type Output = Combined<L, R>;

    fn bitxor(self, rhs: R) -> Self::Output {
        xor(self, rhs.into_expression())
    }
}

impl<L, R> BitXor<R> for &Expression<L>
where
    R: IntoExpression,
    L: Join<R::SqlType>,
    L::Base: Integral,
{
    type Output = Combined<L, R>;

    fn bitxor(self, rhs: R) -> Self::Output {
        xor(self.clone(), rhs.into_expression())
    }
}

impl<L: SqlType> Neg for Expression<L>
where
    L::Base: Numeric,
{
    type Output = Expression<L>;

    fn neg(self) -> Self::Output {
        wrap("-", self)
    }
}

impl<L: SqlType> Neg for &Expression<L>
where
    L::Base: Numeric,
{
    type Output = Expression<L>;

    fn neg(self) -> Self::Output {
        wrap("-", self.clone())
    }
}

impl<L: SqlType<Base = bool>> Not for Expression<L> {
    type Output = Expression<L>;

    fn not(self) -> Self::Output {
        wrap("NOT ", self)
    }
}

impl<L: SqlType<Base = bool>> Not for &Expression<L> {
    type Output = Expression<L>;

    fn not(self) -> Self::Output {
        wrap("NOT ", self.clone())
    }
}

/// `=` / `<>`, rewritten to `IS NULL` / `IS NOT NULL` when either side is
/// an absent literal.
fn equality<A, B, U>(
    lhs: Expression<A>,
    rhs: Expression<B>,
    op: &str,
    null_test: &str,
) -> Expression<U> {
    let tested = if rhs.is_null_literal() {
        lhs.retype::<()>()
    } else if lhs.is_null_literal() {
        rhs.retype::<()>()
    } else {
        return infix(op, lhs, rhs, true);
    };
    let (template, bindings) = tested.into_parts();
    Expression::from_parts(format!("({template} {null_test})"), bindings)
}

#[allow(clippy::should_implement_trait)]
impl<L: SqlType> Expression<L> {
    pub fn eq<R>(&self, rhs: R) -> Expression<Predicate<L, R::SqlType>>
    where
        R: IntoExpression,
        L: Join<R::SqlType>,
    {
        equality(self.clone(), rhs.into_expression(), "=", "IS NULL")
    }

    pub fn ne<R>(&self, rhs: R) -> Expression<Predicate<L, R::SqlType>>
    where
        R: IntoExpression,
        L: Join<R::SqlType>,
    {
        equality(self.clone(), rhs.into_expression(), "<>", "IS NOT NULL")
    }

    pub fn lt<R>(&self, rhs: R) -> Expression<Predicate<L, R::SqlType>>
    where
        R: IntoExpression,
        L: Join<R::SqlType>,
        L::Base: Comparable,
    {
        infix("<", self.clone(), rhs.into_expression(), true)
    }

    pub fn le<R>(&self, rhs: R) -> Expression<Predicate<L, R::SqlType>>
    where
        R: IntoExpression,
        L: Join<R::SqlType>,
        L::Base: Comparable,
    {
        infix("<=", self.clone(), rhs.into_expression(), true)
    }

    pub fn gt<R>(&self, rhs: R) -> Expression<Predicate<L, R::SqlType>>
    where
        R: IntoExpression,
        L: Join<R::SqlType>,
        L::Base: Comparable,
    {
        infix(">", self.clone(), rhs.into_expression(), true)
    }

    pub fn ge<R>(&self, rhs: R) -> Expression<Predicate<L, R::SqlType>>
    where
        R: IntoExpression,
        L: Join<R::SqlType>,
        L::Base: Comparable,
    {
        infix(">=", self.clone(), rhs.into_expression(), true)
    }

    /// `expr BETWEEN ? AND ?` over a closed interval.
    pub fn between(&self, range: RangeInclusive<L::Base>) -> Expression<L::Rebase<bool>>
    where
        L::Base: Comparable,
    {
        let (lower, upper) = range.into_inner();
        let (template, mut bindings) = self.clone().into_parts();
        bindings.push(lower.to_value());
        bindings.push(upper.to_value());
        Expression::from_parts(format!("{template} BETWEEN ? AND ?"), bindings)
    }
}

impl<L: SqlType> Expression<L>
where
    L::Base: Integral,
{
    /// `~(expr)`
    pub fn bit_not(&self) -> Expression<L> {
        wrap("~", self.clone())
    }
}

impl<L: SqlType<Base = bool>> Expression<L> {
    pub fn and<R>(self, rhs: R) -> Combined<L, R>
    where
        R: IntoExpression,
        L: Join<R::SqlType>,
    {
        infix("AND", self, rhs.into_expression(), true)
    }

    pub fn or<R>(self, rhs: R) -> Combined<L, R>
    where
        R: IntoExpression,
        L: Join<R::SqlType>,
    {
        infix("OR", self, rhs.into_expression(), true)
    }
}
