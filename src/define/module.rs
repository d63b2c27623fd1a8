//! `define` module: table-valued functions backed by a stored query
//!
//! ```sql
//! CREATE VIRTUAL TABLE strcut USING define((
//!     select substr(:str, value, 1) as ch from generate_series(1, length(:str))
//! ));
//! SELECT * FROM strcut('hello');
//! ```
//!
//! Result columns of the query become the table's columns. Each query
//! parameter becomes a hidden column, so it can be passed as a function
//! argument.

use std::marker::PhantomData;
use std::os::raw::c_int;
use std::sync::Arc;

use rusqlite::ffi;
use rusqlite::types::Null;
use rusqlite::vtab::{
    escape_double_quote, sqlite3_vtab, sqlite3_vtab_cursor, Context, CreateVTab, Filters,
    IndexConstraintOp, IndexInfo, VTab, VTabConnection, VTabCursor, VTabKind,
};
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Value;

/// Module name used in `CREATE VIRTUAL TABLE ... USING define(...)`.
pub const MODULE_NAME: &str = "define";

/// Most parameters a stored query may take. Given parameters are tracked
/// as bits of the plan's `idx_num`.
pub const MAX_PARAMS: usize = 31;

/// The stored query and the shape of its results.
#[derive(Debug)]
pub struct StoredQuery {
    pub sql: String,
    pub columns: Vec<String>,
    pub params: Vec<String>,
}

impl StoredQuery {
    /// Compile a query to learn its columns and parameters.
    pub fn prepare(conn: &Connection, sql: &str) -> Result<StoredQuery> {
        let stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        if columns.is_empty() {
            return Err(Error::argument("define module needs a query that returns columns"));
        }

        if stmt.parameter_count() > MAX_PARAMS {
            return Err(Error::argument(format!(
                "define module supports at most {} parameters, query has {}",
                MAX_PARAMS,
                stmt.parameter_count()
            )));
        }

        let mut params = Vec::with_capacity(stmt.parameter_count());
        for i in 1..=stmt.parameter_count() {
            let name = stmt
                .parameter_name(i)
                .map(|n| n.trim_start_matches([':', '@', '$', '?']).to_string())
                .filter(|n| !n.is_empty() && n.parse::<u32>().is_err())
                .unwrap_or_else(|| format!("p{}", i));
            let taken = |candidate: &str| {
                columns.iter().chain(params.iter()).any(|c| c.eq_ignore_ascii_case(candidate))
            };
            let name = if taken(&name) { format!("p{}", i) } else { name };
            params.push(name);
        }

        Ok(StoredQuery {
            sql: sql.to_string(),
            columns,
            params,
        })
    }

    /// `CREATE TABLE` statement with parameters as hidden columns.
    pub fn declare_sql(&self) -> String {
        let visible = self
            .columns
            .iter()
            .map(|c| format!("\"{}\"", escape_double_quote(c)));
        let hidden = self
            .params
            .iter()
            .map(|p| format!("\"{}\" HIDDEN", escape_double_quote(p)));
        format!("CREATE TABLE x({})", visible.chain(hidden).collect::<Vec<_>>().join(", "))
    }

    fn run(&self, conn: &Connection, args: &[Value]) -> Result<Vec<Vec<Value>>> {
        let mut stmt = conn.prepare(&self.sql)?;
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..self.columns.len())
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(values);
        }
        Ok(out)
    }
}

/// Strip the parentheses wrapping the module argument.
fn unwrap_query(arg: &str) -> &str {
    let s = arg.trim();
    match s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => inner.trim(),
        None => s,
    }
}

#[repr(C)]
pub struct DefineTab {
    /// Base class. Must be first
    base: sqlite3_vtab,
    db: *mut ffi::sqlite3,
    query: Arc<StoredQuery>,
}

unsafe impl<'vtab> VTab<'vtab> for DefineTab {
    type Aux = ();
    type Cursor = DefineCursor<'vtab>;

    fn connect(
        db: &mut VTabConnection,
        _aux: Option<&()>,
        args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        if args.len() < 4 {
            return Err(rusqlite::Error::ModuleError(
                "define module requires a query".to_owned(),
            ));
        }
        let parts = args[3..]
            .iter()
            .map(|arg| std::str::from_utf8(arg))
            .collect::<std::result::Result<Vec<&str>, _>>()?;
        let joined = parts.join(",");
        let sql = unwrap_query(&joined);

        let handle = unsafe { db.handle() };
        let conn = unsafe { Connection::from_handle(handle)? };
        let query = StoredQuery::prepare(&conn, sql)?;
        debug!(
            table = %String::from_utf8_lossy(args[2]),
            params = query.params.len(),
            "define table connected"
        );

        let declare = query.declare_sql();
        Ok((
            declare,
            DefineTab {
                base: sqlite3_vtab::default(),
                db: handle,
                query: Arc::new(query),
            },
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        let n_columns = self.query.columns.len() as c_int;
        let n_params = self.query.params.len();

        // constraint index for each parameter, if an equality was given
        let mut provided: Vec<Option<usize>> = vec![None; n_params];
        for (i, constraint) in info.constraints().enumerate() {
            if !constraint.is_usable()
                || constraint.operator() != IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ
            {
                continue;
            }
            let Ok(param) = usize::try_from(constraint.column() - n_columns) else {
                continue;
            };
            if param < n_params && provided[param].is_none() {
                provided[param] = Some(i);
            }
        }

        let mut mask: c_int = 0;
        let mut argv_index = 0;
        for (param, constraint) in provided.iter().enumerate() {
            if let Some(i) = *constraint {
                argv_index += 1;
                mask |= 1 << param;
                let mut usage = info.constraint_usage(i);
                usage.set_argv_index(argv_index);
                usage.set_omit(true);
            }
        }
        info.set_idx_num(mask);

        let missing = n_params - argv_index as usize;
        info.set_estimated_cost(if missing == 0 { 10.0 } else { 1_000_000.0 * missing as f64 });
        info.set_estimated_rows(100);
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<DefineCursor<'vtab>> {
        Ok(DefineCursor {
            base: sqlite3_vtab_cursor::default(),
            db: self.db,
            query: Arc::clone(&self.query),
            args: Vec::new(),
            rows: Vec::new(),
            pos: 0,
            phantom: PhantomData,
        })
    }
}

impl CreateVTab<'_> for DefineTab {
    const KIND: VTabKind = VTabKind::Default;
}

#[repr(C)]
pub struct DefineCursor<'vtab> {
    /// Base class. Must be first
    base: sqlite3_vtab_cursor,
    db: *mut ffi::sqlite3,
    query: Arc<StoredQuery>,
    /// Parameter values for the current scan, NULL where not given.
    args: Vec<Value>,
    rows: Vec<Vec<Value>>,
    pos: usize,
    phantom: PhantomData<&'vtab DefineTab>,
}

unsafe impl VTabCursor for DefineCursor<'_> {
    fn filter(
        &mut self,
        idx_num: c_int,
        _idx_str: Option<&str>,
        args: &Filters<'_>,
    ) -> rusqlite::Result<()> {
        let mut given = args.iter();
        self.args = (0..self.query.params.len())
            .map(|param| {
                if idx_num & (1 << param) != 0 {
                    given.next().map(Value::from).unwrap_or_default()
                } else {
                    Value::Null
                }
            })
            .collect();

        let conn = unsafe { Connection::from_handle(self.db)? };
        self.rows = self.query.run(&conn, &self.args)?;
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.pos += 1;
        Ok(())
    }

    fn eof(&self) -> bool {
        self.pos >= self.rows.len()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let Ok(i) = usize::try_from(i) else {
            return ctx.set_result(&Null);
        };
        let n_columns = self.query.columns.len();
        let value = if i < n_columns {
            self.rows.get(self.pos).and_then(|row| row.get(i))
        } else {
            self.args.get(i - n_columns)
        };
        match value {
            Some(value) => ctx.set_result(value),
            None => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.pos as i64 + 1)
    }
}
