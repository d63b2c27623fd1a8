//! define: user-defined functions written in SQL
//!
//! ```sql
//! SELECT define('sumn', ':n * (:n + 1) / 2');
//! SELECT sumn(5);                  -- 15
//! SELECT undefine('sumn');
//! SELECT eval('select 1 + 1');     -- '2'
//! ```
//!
//! Definitions are stored in the database and bound again by `init` on
//! every new connection.

pub mod eval;
pub mod module;
pub mod registry;

use std::sync::Arc;

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::Null;
use rusqlite::vtab::read_only_module;
use rusqlite::Connection;
use tracing::debug;

pub use eval::{eval, DEFAULT_SEPARATOR};
pub use module::{DefineCursor, DefineTab, StoredQuery};
pub use registry::{FunctionRecord, Registry, SHADOW_TABLE};

use crate::error::{Error, Result};
use crate::types::Value;

/// Return type stored for `define(name, body)`.
const DEFAULT_KIND: &str = "scalar";

fn flags() -> FunctionFlags {
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DIRECTONLY
}

/// Text argument `idx`, or an error naming the function.
fn text_arg(ctx: &Context<'_>, func: &str, idx: usize) -> rusqlite::Result<String> {
    Value::from(ctx.get_raw(idx))
        .as_text()
        .ok_or_else(|| Error::argument(format!("{}: argument {} must not be NULL", func, idx + 1)).into())
}

/// Create the shadow table, register the SQL functions and the `define`
/// module, then bind every stored function.
///
/// Stored functions that no longer compile are logged and skipped. The
/// connection's commit and rollback hooks are taken over to keep bindings
/// in step with the shadow table, so `conn` must be an owned connection.
pub fn init(conn: &Connection) -> Result<Arc<Registry>> {
    Registry::ensure_table(conn)?;
    let registry = Arc::new(Registry::new());

    let reg = Arc::clone(&registry);
    conn.create_scalar_function("define", 2, flags(), move |ctx| {
        let name = text_arg(ctx, "define", 0)?;
        let body = text_arg(ctx, "define", 1)?;
        let conn = unsafe { ctx.get_connection()? };
        reg.save_function(&conn, &name, DEFAULT_KIND, &body)?;
        Ok(Null)
    })?;

    let reg = Arc::clone(&registry);
    conn.create_scalar_function("define", 3, flags(), move |ctx| {
        let name = text_arg(ctx, "define", 0)?;
        let kind = text_arg(ctx, "define", 1)?;
        let body = text_arg(ctx, "define", 2)?;
        let conn = unsafe { ctx.get_connection()? };
        reg.save_function(&conn, &name, &kind, &body)?;
        Ok(Null)
    })?;

    let reg = Arc::clone(&registry);
    conn.create_scalar_function("undefine", 1, flags(), move |ctx| {
        let name = text_arg(ctx, "undefine", 0)?;
        let conn = unsafe { ctx.get_connection()? };
        reg.drop_function(&conn, &name)?;
        Ok(Null)
    })?;

    let reg = Arc::clone(&registry);
    conn.create_scalar_function("define_reload", 0, flags(), move |ctx| {
        let conn = unsafe { ctx.get_connection()? };
        let bound = reg.reload(&conn)?;
        Ok(bound as i64)
    })?;

    for n_arg in [1, 2] {
        conn.create_scalar_function("eval", n_arg, flags(), move |ctx| {
            let sql = text_arg(ctx, "eval", 0)?;
            let sep = if ctx.len() > 1 {
                text_arg(ctx, "eval", 1)?
            } else {
                DEFAULT_SEPARATOR.to_string()
            };
            let conn = unsafe { ctx.get_connection()? };
            eval(&conn, &sql, &sep).map_err(rusqlite::Error::from)
        })?;
    }

    conn.create_module(module::MODULE_NAME, read_only_module::<DefineTab>(), None)?;

    let reg = Arc::clone(&registry);
    conn.commit_hook(Some(move || {
        reg.commit();
        false
    }))?;
    let reg = Arc::clone(&registry);
    conn.rollback_hook(Some(move || reg.rollback()))?;

    let bound = registry.reload(conn)?;
    debug!(bound, "define extension initialized");
    Ok(registry)
}
