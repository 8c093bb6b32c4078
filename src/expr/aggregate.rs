//! Aggregates, casts and collations

use super::{wrap, Collation, Expression};
use crate::datatype::{Comparable, Datatype, Numeric, SqlType};

impl<T: SqlType> Expression<T> {
    /// `DISTINCT expr`, for use inside an aggregate.
    pub fn distinct(&self) -> Expression<T> {
        let (template, bindings) = self.clone().into_parts();
        Expression::from_parts(format!("DISTINCT {template}"), bindings)
    }

    /// `count(expr)`, non-null values only.
    pub fn count(&self) -> Expression<i64> {
        wrap("count", self.clone())
    }

    /// `max(expr)`, absent over an empty set.
    pub fn max(&self) -> Expression<Option<T::Base>>
    where
        T::Base: Comparable,
    {
        wrap("max", self.clone())
    }

    /// `min(expr)`, absent over an empty set.
    pub fn min(&self) -> Expression<Option<T::Base>>
    where
        T::Base: Comparable,
    {
        wrap("min", self.clone())
    }

    pub fn avg(&self) -> Expression<Option<f64>>
    where
        T::Base: Numeric,
    {
        wrap("avg", self.clone())
    }

    /// `sum(expr)`, absent over an empty set.
    pub fn sum(&self) -> Expression<Option<T::Base>>
    where
        T::Base: Numeric,
    {
        wrap("sum", self.clone())
    }

    /// `total(expr)`, always a float and `0.0` over an empty set.
    pub fn total(&self) -> Expression<f64>
    where
        T::Base: Numeric,
    {
        wrap("total", self.clone())
    }

    /// `CAST (expr AS <declared type of U>)`, keeping nullability.
    pub fn cast<U: Datatype>(&self) -> Expression<T::Rebase<U>> {
        let (template, bindings) = self.clone().into_parts();
        Expression::from_parts(
            format!("CAST ({template} AS {})", U::DECLARED_TYPE.as_str()),
            bindings,
        )
    }
}

impl<T: SqlType<Base = String>> Expression<T> {
    /// `expr COLLATE <name>`
    pub fn collate(&self, collation: Collation) -> Expression<T> {
        let (template, bindings) = self.clone().into_parts();
        Expression::from_parts(format!("{template} COLLATE {}", collation.name()), bindings)
    }
}
