//! The vsv virtual table and its cursor

use std::io::BufRead;
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::sync::Arc;

use rusqlite::ffi;
use rusqlite::types::Null;
use rusqlite::vtab::{
    sqlite3_vtab, sqlite3_vtab_cursor, Context, CreateVTab, Filters, IndexInfo, VTab,
    VTabConnection, VTabCursor, VTabKind,
};
use tracing::debug;

use crate::error::{Error, ErrorCode};
use crate::types::{apply_affinity, Value};

use super::dialect::VsvOptions;
use super::reader::RecordReader;
use super::schema::{derive_schema, Column};

/// Cost reported for every plan: a full scan of unknown length.
const FULL_SCAN_COST: f64 = 1_000_000.0;
const FULL_SCAN_ROWS: i64 = 1_000_000;

/// A delimited text source exposed as a read-only table.
#[repr(C)]
pub struct VsvTab {
    /// Base class. Must be first
    base: sqlite3_vtab,
    options: Arc<VsvOptions>,
    columns: Arc<[Column]>,
    db: *mut ffi::sqlite3,
}

unsafe impl<'vtab> VTab<'vtab> for VsvTab {
    type Aux = ();
    type Cursor = VsvCursor<'vtab>;

    fn connect(
        db: &mut VTabConnection,
        _aux: Option<&()>,
        args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        if args.len() < 3 {
            return Err(rusqlite::Error::ModuleError("no table name".to_owned()));
        }
        let user_args = args[3..]
            .iter()
            .map(|arg| std::str::from_utf8(arg))
            .collect::<std::result::Result<Vec<&str>, _>>()?;

        let options = VsvOptions::parse(&user_args)?;
        let schema = derive_schema(&options)?;
        debug!(
            table = %String::from_utf8_lossy(args[2]),
            columns = schema.len(),
            "vsv table connected"
        );

        let vtab = VsvTab {
            base: sqlite3_vtab::default(),
            options: Arc::new(options),
            columns: Arc::from(schema.columns),
            db: unsafe { db.handle() },
        };
        Ok((schema.sql, vtab))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        info.set_estimated_cost(FULL_SCAN_COST);
        info.set_estimated_rows(FULL_SCAN_ROWS);
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<VsvCursor<'vtab>> {
        VsvCursor::new(self)
    }
}

impl CreateVTab<'_> for VsvTab {
    const KIND: VTabKind = VTabKind::Default;
}

/// Cursor streaming records from the table's source.
#[repr(C)]
pub struct VsvCursor<'vtab> {
    /// Base class. Must be first
    base: sqlite3_vtab_cursor,
    options: Arc<VsvOptions>,
    columns: Arc<[Column]>,
    db: *mut ffi::sqlite3,
    reader: RecordReader<Box<dyn BufRead>>,
    /// Whether the reader has moved past the header.
    scanned: bool,
    eof: bool,
    rowid: i64,
    phantom: PhantomData<&'vtab VsvTab>,
}

impl VsvCursor<'_> {
    fn new(table: &VsvTab) -> rusqlite::Result<Self> {
        let reader = open_reader(&table.options)?;
        Ok(VsvCursor {
            base: sqlite3_vtab_cursor::default(),
            options: Arc::clone(&table.options),
            columns: Arc::clone(&table.columns),
            db: table.db,
            reader,
            scanned: false,
            eof: false,
            rowid: 0,
            phantom: PhantomData,
        })
    }

    fn is_interrupted(&self) -> bool {
        !self.db.is_null() && unsafe { ffi::sqlite3_is_interrupted(self.db) } != 0
    }

    /// Value of column `i` for the current record.
    fn value(&self, i: usize) -> Value {
        let Some(column) = self.columns.get(i) else {
            return Value::Null;
        };
        let record = self.reader.record();
        let value = match record.get(i) {
            Some(field) if field.is_empty() && self.options.nulls && !record.is_quoted(i) => {
                Value::Null
            }
            Some(field) => Value::Text(String::from_utf8_lossy(field).into_owned()),
            None if self.options.nulls => Value::Null,
            None => Value::Text(String::new()),
        };
        apply_affinity(value, column.affinity)
    }
}

/// Open the source and move past skipped records and the header.
fn open_reader(options: &VsvOptions) -> crate::error::Result<RecordReader<Box<dyn BufRead>>> {
    let mut reader = RecordReader::new(options.source.open()?, options.dialect.clone());
    reader.skip_records(options.skip)?;
    if options.header {
        reader.read_record()?;
    }
    Ok(reader)
}

unsafe impl VTabCursor for VsvCursor<'_> {
    fn filter(
        &mut self,
        _idx_num: c_int,
        _idx_str: Option<&str>,
        _args: &Filters<'_>,
    ) -> rusqlite::Result<()> {
        if self.scanned {
            self.reader = open_reader(&self.options)?;
        }
        self.scanned = true;
        self.rowid = 0;
        self.eof = false;
        self.next()
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        if self.is_interrupted() {
            return Err(Error::new(ErrorCode::Interrupt).into());
        }
        match self.reader.read_record().map_err(rusqlite::Error::from)? {
            Some(_) => self.rowid += 1,
            None => {
                self.eof = true;
                debug!(records = self.reader.records_read(), "vsv scan finished");
            }
        }
        Ok(())
    }

    fn eof(&self) -> bool {
        self.eof
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        match usize::try_from(i) {
            Ok(i) => ctx.set_result(&self.value(i)),
            Err(_) => ctx.set_result(&Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.rowid)
    }
}
