//! Custom SQL functions and collations
//!
//! The connection keeps every registered callback in its own registry,
//! keyed by name (and arity for functions), so a registration can be
//! replaced or removed explicitly and looked up for as long as the engine
//! may call it.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use rusqlite::functions::FunctionFlags;
use tracing::debug;

use super::Connection;
use crate::error::Result;
use crate::expr::{function, quote_identifier, Expression};
use crate::value::Value;

type ScalarFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;
type CollationFn = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

#[derive(Default)]
pub(crate) struct FunctionRegistry {
    functions: RefCell<HashMap<(String, i32), ScalarFn>>,
    collations: RefCell<HashMap<String, CollationFn>>,
}

/// A registered scalar function, used to build calls to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFunction {
    name: String,
    arity: i32,
}

impl SqlFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of arguments, `-1` for variadic functions.
    pub fn arity(&self) -> i32 {
        self.arity
    }

    /// `"name"(args...)`
    pub fn call<T>(&self, args: Vec<Expression>) -> Expression<T> {
        function(&quote_identifier(&self.name), args)
    }
}

impl Connection {
    /// Register a scalar function, replacing any with the same name and arity.
    pub fn create_function<F>(
        &self,
        name: &str,
        arity: i32,
        deterministic: bool,
        callback: F,
    ) -> Result<SqlFunction>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        let callback: ScalarFn = Arc::new(callback);
        let mut flags = FunctionFlags::SQLITE_UTF8;
        if deterministic {
            flags |= FunctionFlags::SQLITE_DETERMINISTIC;
        }

        let registered = AssertUnwindSafe(Arc::clone(&callback));
        self.raw()
            .create_scalar_function(name, arity, flags, move |ctx| {
                let registered = &registered;
                let args: Vec<Value> = (0..ctx.len())
                    .map(|i| Value::from(ctx.get_raw(i)))
                    .collect();
                Ok(rusqlite::types::Value::from((registered.0)(&args)))
            })?;

        self.registry
            .functions
            .borrow_mut()
            .insert((name.to_string(), arity), callback);
        debug!(name, arity, "registered function");
        Ok(SqlFunction {
            name: name.to_string(),
            arity,
        })
    }

    pub fn remove_function(&self, name: &str, arity: i32) -> Result<()> {
        self.raw().remove_function(name, arity)?;
        self.registry
            .functions
            .borrow_mut()
            .remove(&(name.to_string(), arity));
        Ok(())
    }

    pub fn has_function(&self, name: &str, arity: i32) -> bool {
        self.registry
            .functions
            .borrow()
            .contains_key(&(name.to_string(), arity))
    }

    /// Register a collating sequence, replacing any with the same name.
    pub fn create_collation<F>(&self, name: &str, compare: F) -> Result<()>
    where
        F: Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    {
        let compare: CollationFn = Arc::new(compare);
        let registered = AssertUnwindSafe(Arc::clone(&compare));
        self.raw().create_collation(name, move |a: &str, b: &str| {
            let registered = &registered;
            (registered.0)(a, b)
        })?;

        self.registry
            .collations
            .borrow_mut()
            .insert(name.to_string(), compare);
        debug!(name, "registered collation");
        Ok(())
    }

    pub fn remove_collation(&self, name: &str) -> Result<()> {
        self.raw().remove_collation(name)?;
        self.registry.collations.borrow_mut().remove(name);
        Ok(())
    }

    pub fn has_collation(&self, name: &str) -> bool {
        self.registry.collations.borrow().contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expressible;

    #[test]
    fn test_call_quotes_name() {
        let f = SqlFunction {
            name: "my\"fn".to_string(),
            arity: 2,
        };
        let call: Expression<i64> = f.call(vec![
            Expression::value(1_i64).untyped(),
            Expression::<i64>::column("x").untyped(),
        ]);
        assert_eq!(call.template(), "\"my\"\"fn\"(?, \"x\")");
        assert_eq!(call.compile_standalone(), "\"my\"\"fn\"(1, \"x\")");
    }

    #[test]
    fn test_registry_replace_and_remove() {
        let conn = Connection::open_in_memory().unwrap();
        conn.create_function("twice", 1, true, |args| match args {
            [Value::Integer(i)] => Value::Integer(i * 2),
            _ => Value::Null,
        })
        .unwrap();
        assert_eq!(conn.scalar_as::<i64>("SELECT twice(21)", &[]).unwrap(), 42);

        conn.create_function("twice", 1, true, |_| Value::Integer(0))
            .unwrap();
        assert_eq!(conn.scalar_as::<i64>("SELECT twice(21)", &[]).unwrap(), 0);
        assert!(conn.has_function("twice", 1));

        conn.remove_function("twice", 1).unwrap();
        assert!(!conn.has_function("twice", 1));
        assert!(conn.prepare("SELECT twice(21)").is_err());
    }
}
