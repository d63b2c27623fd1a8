//! Scalar function registration
//!
//! Extension functions are plain `fn(&[Value]) -> Result<Value>`; this
//! module binds them to a host connection and converts values and errors at
//! the boundary.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::Connection;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Value;

/// Function implementation type
pub type ScalarFunc = fn(&[Value]) -> Result<Value>;

/// A scalar function and the argument counts it accepts.
#[derive(Clone, Copy)]
pub struct FunctionDef {
    pub name: &'static str,
    pub min_args: i32,
    /// `None` registers a single variadic function.
    pub max_args: Option<i32>,
    pub func: ScalarFunc,
}

impl FunctionDef {
    pub const fn fixed(name: &'static str, min_args: i32, max_args: i32, func: ScalarFunc) -> Self {
        FunctionDef {
            name,
            min_args,
            max_args: Some(max_args),
            func,
        }
    }

    pub const fn variadic(name: &'static str, min_args: i32, func: ScalarFunc) -> Self {
        FunctionDef {
            name,
            min_args,
            max_args: None,
            func,
        }
    }
}

fn flags() -> FunctionFlags {
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC | FunctionFlags::SQLITE_INNOCUOUS
}

/// Collect the call's arguments as owned values.
pub fn collect_args(ctx: &Context<'_>) -> Vec<Value> {
    (0..ctx.len()).map(|i| Value::from(ctx.get_raw(i))).collect()
}

/// Register one arity of a scalar function.
pub fn register_scalar(conn: &Connection, name: &str, n_arg: i32, func: ScalarFunc) -> Result<()> {
    conn.create_scalar_function(name, n_arg, flags(), move |ctx| {
        let args = collect_args(ctx);
        func(&args).map_err(rusqlite::Error::from)
    })?;
    Ok(())
}

/// Register every arity of every function in `defs`.
pub fn register_functions(conn: &Connection, defs: &[FunctionDef]) -> Result<()> {
    for def in defs {
        match def.max_args {
            Some(max) => {
                for n_arg in def.min_args..=max {
                    register_scalar(conn, def.name, n_arg, def.func)?;
                }
            }
            None => register_scalar(conn, def.name, -1, def.func)?,
        }
    }
    debug!(count = defs.len(), "registered scalar functions");
    Ok(())
}

/// Fail unless a variadic call got at least `min` arguments.
pub fn check_min_args(name: &str, args: &[Value], min: usize) -> Result<()> {
    if args.len() < min {
        return Err(Error::argument(format!(
            "{}() requires at least {} argument{}",
            name,
            min,
            if min == 1 { "" } else { "s" }
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func_first_or_null(args: &[Value]) -> Result<Value> {
        Ok(args.first().cloned().unwrap_or_default())
    }

    fn func_fail(_args: &[Value]) -> Result<Value> {
        Err(Error::argument("bad input"))
    }

    #[test]
    fn test_register_functions() {
        let conn = Connection::open_in_memory().unwrap();
        let defs = [
            FunctionDef::fixed("first_of", 0, 2, func_first_or_null),
            FunctionDef::variadic("first_any", 0, func_first_or_null),
            FunctionDef::fixed("always_fails", 0, 0, func_fail),
        ];
        register_functions(&conn, &defs).unwrap();

        let v: i64 = conn.query_row("SELECT first_of(5, 6)", [], |r| r.get(0)).unwrap();
        assert_eq!(v, 5);
        let v: Option<i64> = conn.query_row("SELECT first_of()", [], |r| r.get(0)).unwrap();
        assert_eq!(v, None);
        let v: String = conn
            .query_row("SELECT first_any('a', 'b', 'c', 'd')", [], |r| r.get(0))
            .unwrap();
        assert_eq!(v, "a");
        assert!(conn.query_row("SELECT first_of(1, 2, 3)", [], |r| r.get::<_, i64>(0)).is_err());

        let err = conn
            .query_row("SELECT always_fails()", [], |r| r.get::<_, i64>(0))
            .unwrap_err();
        assert!(err.to_string().contains("bad input"));
    }

    #[test]
    fn test_check_min_args() {
        assert!(check_min_args("f", &[Value::Null], 1).is_ok());
        let err = check_min_args("f", &[], 2).unwrap_err();
        assert_eq!(err.to_string(), "f() requires at least 2 arguments");
    }
}
