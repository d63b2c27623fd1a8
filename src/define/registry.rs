//! Persistent user-defined functions
//!
//! Definitions live in the `sqlean_define` table of the user database and
//! are bound as scalar functions on every connection that runs `init`.
//!
//! SQLite refuses to replace or delete a function while any statement is
//! running, which includes the `SELECT undefine(...)` doing the dropping. A
//! dropped binding is therefore retired in place: it stays registered but
//! fails when called, and is revived if a function with the same name and
//! argument count is defined again.
//!
//! Inside an explicit transaction every binding change is journaled. A
//! `ROLLBACK` restores the bindings to what they were at `BEGIN`, matching
//! the shadow table; a `COMMIT` keeps them. Savepoints are not tracked.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, Connection};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::functions::collect_args;
use crate::types::{apply_affinity, Affinity, Value};

/// Shadow table holding the definitions.
pub const SHADOW_TABLE: &str = "sqlean_define";

/// One row of the shadow table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub name: String,
    /// Declared return type: an affinity keyword, or `scalar`/`any`/empty
    /// for no coercion.
    pub kind: String,
    pub body: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn registry_error(err: rusqlite::Error) -> Error {
    Error::registry(err.to_string())
}

/// Return affinity for a declared function type.
pub fn return_affinity(kind: &str) -> Result<Option<Affinity>> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "" | "any" | "scalar" => Ok(None),
        other => Affinity::from_keyword(other)
            .map(Some)
            .ok_or_else(|| Error::registry(format!("unknown function type: '{}'", kind))),
    }
}

/// Compile `SELECT <body>`, returning the statement text and its parameter
/// count.
pub fn compile(conn: &Connection, body: &str) -> Result<(String, i32)> {
    let sql = format!("SELECT {}", body);
    let stmt = conn
        .prepare(&sql)
        .map_err(|e| Error::registry(format!("invalid function body: {}", e)))?;
    let n_arg = i32::try_from(stmt.parameter_count())
        .map_err(|_| Error::registry("too many parameters"))?;
    Ok((sql, n_arg))
}

#[derive(Debug, Clone)]
struct Compiled {
    sql: String,
    affinity: Option<Affinity>,
}

/// State shared between the registry and the host's callback.
#[derive(Debug)]
struct Slot {
    name: String,
    /// `None` once the function is dropped.
    compiled: Mutex<Option<Compiled>>,
}

impl Slot {
    fn current(&self) -> Option<Compiled> {
        lock(&self.compiled).clone()
    }

    fn set(&self, compiled: Option<Compiled>) {
        *lock(&self.compiled) = compiled;
    }

    fn is_live(&self) -> bool {
        lock(&self.compiled).is_some()
    }

    fn call(&self, conn: &Connection, args: &[Value]) -> Result<Value> {
        let compiled = self
            .current()
            .ok_or_else(|| Error::registry(format!("function {} was dropped", self.name)))?;
        let mut stmt = conn.prepare(&compiled.sql)?;
        let mut rows = stmt.query(params_from_iter(args.iter()))?;
        let value = match rows.next()? {
            Some(row) => row.get::<_, Value>(0)?,
            None => Value::Null,
        };
        Ok(match compiled.affinity {
            Some(affinity) => apply_affinity(value, affinity),
            None => value,
        })
    }
}

/// Slot states to restore if the open transaction rolls back.
type UndoLog = Vec<(Arc<Slot>, Option<Compiled>)>;

struct Binding {
    name: String,
    n_arg: i32,
    slot: Arc<Slot>,
}

impl Binding {
    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Functions bound on one connection.
#[derive(Default)]
pub struct Registry {
    bindings: Mutex<Vec<Binding>>,
    undo: Mutex<UndoLog>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the shadow table if it does not exist.
    pub fn ensure_table(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {}(name TEXT PRIMARY KEY, type TEXT, body TEXT)",
            SHADOW_TABLE
        ))
        .map_err(registry_error)
    }

    /// Persisted definitions in the order they were saved.
    pub fn list_functions(conn: &Connection) -> Result<Vec<FunctionRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT name, ifnull(type, ''), body FROM {} ORDER BY rowid",
                SHADOW_TABLE
            ))
            .map_err(registry_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FunctionRecord {
                    name: row.get(0)?,
                    kind: row.get(1)?,
                    body: row.get(2)?,
                })
            })
            .map_err(registry_error)?;
        let records = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(registry_error)?;
        Ok(records)
    }

    /// Names of the functions currently callable.
    pub fn bound_names(&self) -> Vec<String> {
        lock(&self.bindings)
            .iter()
            .filter(|b| b.slot.is_live())
            .map(|b| b.name.clone())
            .collect()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        lock(&self.bindings)
            .iter()
            .any(|b| b.matches(name) && b.slot.is_live())
    }

    /// Persist a new function and bind it. Nothing is persisted when the
    /// body does not compile or the binding fails.
    pub fn save_function(&self, conn: &Connection, name: &str, kind: &str, body: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::argument("function name must not be empty"));
        }
        let affinity = return_affinity(kind)?;
        let (sql, n_arg) = compile(conn, body)?;

        let existing: i64 = conn
            .query_row(
                &format!("SELECT count(*) FROM {} WHERE name = ?1 COLLATE NOCASE", SHADOW_TABLE),
                [name],
                |row| row.get(0),
            )
            .map_err(registry_error)?;
        if existing > 0 {
            return Err(Error::registry(format!("function {} already exists", name)));
        }

        conn.execute(
            &format!("INSERT INTO {}(name, type, body) VALUES (?1, ?2, ?3)", SHADOW_TABLE),
            params![name, kind, body],
        )
        .map_err(registry_error)?;

        let mut undo = UndoLog::new();
        let bound = self.bind(conn, name, n_arg, Compiled { sql, affinity }, &mut undo);
        self.journal(conn, undo);
        if let Err(err) = bound {
            if let Err(cleanup) = conn.execute(
                &format!("DELETE FROM {} WHERE name = ?1", SHADOW_TABLE),
                [name],
            ) {
                warn!(name, error = %cleanup, "failed to remove definition after bind error");
            }
            return Err(err);
        }
        debug!(name, n_arg, "function saved");
        Ok(())
    }

    /// Delete a definition and retire its binding. Returns false when there
    /// was nothing to drop.
    pub fn drop_function(&self, conn: &Connection, name: &str) -> Result<bool> {
        let deleted = conn
            .execute(
                &format!("DELETE FROM {} WHERE name = ?1 COLLATE NOCASE", SHADOW_TABLE),
                [name],
            )
            .map_err(registry_error)?;

        let mut retired = false;
        let mut undo = UndoLog::new();
        lock(&self.bindings).retain(|b| {
            if !b.matches(name) || !b.slot.is_live() {
                return true;
            }
            retired = true;
            retire(conn, b, &mut undo)
        });
        self.journal(conn, undo);
        debug!(name, deleted, retired, "function dropped");
        Ok(deleted > 0 || retired)
    }

    /// Bind every persisted function not yet bound, rebind changed ones and
    /// retire bindings whose definitions are gone. Rows that fail are logged
    /// and skipped. Returns the number of bound functions.
    pub fn reload(&self, conn: &Connection) -> Result<usize> {
        let records = Self::list_functions(conn)?;

        // reload follows the table as it is now, so its changes are not journaled
        let mut undo = UndoLog::new();
        lock(&self.bindings).retain(|b| {
            let persisted = records.iter().any(|r| b.matches(&r.name));
            if persisted && b.slot.is_live() {
                return true;
            }
            retire(conn, b, &mut undo)
        });

        for record in &records {
            if let Err(err) = self.bind_record(conn, record, &mut undo) {
                warn!(name = %record.name, error = %err, "failed to bind function");
            }
        }
        Ok(self.bound_names().len())
    }

    /// Forget the journal once the transaction is committed.
    pub fn commit(&self) {
        lock(&self.undo).clear();
    }

    /// Put every binding changed since the transaction began back the way
    /// it was.
    pub fn rollback(&self) {
        let undo = std::mem::take(&mut *lock(&self.undo));
        if undo.is_empty() {
            return;
        }
        debug!(changes = undo.len(), "function bindings rolled back");
        for (slot, previous) in undo.into_iter().rev() {
            slot.set(previous);
        }
    }

    /// Keep `undo` until the transaction ends. Changes made in autocommit
    /// mode are already durable.
    fn journal(&self, conn: &Connection, undo: UndoLog) {
        if !undo.is_empty() && !conn.is_autocommit() {
            lock(&self.undo).extend(undo);
        }
    }

    fn bind_record(&self, conn: &Connection, record: &FunctionRecord, undo: &mut UndoLog) -> Result<()> {
        let affinity = return_affinity(&record.kind)?;
        let (sql, n_arg) = compile(conn, &record.body)?;
        self.bind(conn, &record.name, n_arg, Compiled { sql, affinity }, undo)
    }

    fn bind(
        &self,
        conn: &Connection,
        name: &str,
        n_arg: i32,
        compiled: Compiled,
        undo: &mut UndoLog,
    ) -> Result<()> {
        let mut bindings = lock(&self.bindings);

        // A definition whose argument count changed leaves its old binding behind.
        bindings.retain(|b| {
            !(b.matches(name) && b.n_arg != n_arg && b.slot.is_live()) || retire(conn, b, undo)
        });

        if let Some(binding) = bindings.iter().find(|b| b.matches(name) && b.n_arg == n_arg) {
            undo.push((Arc::clone(&binding.slot), binding.slot.current()));
            binding.slot.set(Some(compiled));
            return Ok(());
        }

        let slot = Arc::new(Slot {
            name: name.to_string(),
            compiled: Mutex::new(Some(compiled)),
        });
        let callback = Arc::clone(&slot);
        conn.create_scalar_function(name, n_arg, FunctionFlags::SQLITE_UTF8, move |ctx| {
            let args = collect_args(ctx);
            let conn = unsafe { ctx.get_connection()? };
            callback.call(&conn, &args).map_err(rusqlite::Error::from)
        })?;
        undo.push((Arc::clone(&slot), None));
        bindings.push(Binding {
            name: name.to_string(),
            n_arg,
            slot,
        });
        debug!(name, n_arg, "function bound");
        Ok(())
    }
}

/// Make a binding fail when called and try to unregister it. Returns true
/// when the binding must be kept as a tombstone.
///
/// Inside a transaction the binding is always kept, so a rollback can
/// revive it.
fn retire(conn: &Connection, binding: &Binding, undo: &mut UndoLog) -> bool {
    undo.push((Arc::clone(&binding.slot), binding.slot.current()));
    binding.slot.set(None);
    if !conn.is_autocommit() {
        return true;
    }
    match conn.remove_function(binding.name.as_str(), binding.n_arg) {
        Ok(()) => false,
        Err(err) => {
            debug!(name = %binding.name, error = %err, "function retired in place");
            true
        }
    }
}
